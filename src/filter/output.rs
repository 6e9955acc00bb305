/// A resource produced by a filter node (for example a GPU surface or a CPU plane).
///
/// Outputs are *defined* lazily without touching backing memory; memory is only acquired by
/// [`Renderable::allocate`] right before the owning node renders and released again by
/// [`Renderable::deallocate`] once no later consumer needs it.
pub trait Renderable: 'static {
    /// Acquire backing storage. Called once per frame before the owning node renders.
    fn allocate(&mut self) -> anyhow::Result<()>;

    /// Release backing storage. Must be safe to call on an unallocated resource.
    fn deallocate(&mut self);
}
