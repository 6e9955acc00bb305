use super::*;

#[test]
fn linear_prefixes_accumulate_in_order() {
    let source = FilterTag::new("Source");
    let mut gain = FilterTag::new("Gain(2)");
    gain.add_prefix(std::slice::from_ref(&source));
    let mut sharpen = FilterTag::new("Sharpen");
    sharpen.add_prefix(std::slice::from_ref(&gain));

    assert_eq!(sharpen.chain_description(), "Source -> Gain(2) -> Sharpen");
}

#[test]
fn distinct_branches_are_grouped_and_duplicates_merged() {
    let mut a = FilterTag::new("A");
    a.add_prefix(&[FilterTag::new("S")]);
    let mut b = FilterTag::new("B");
    b.add_prefix(&[FilterTag::new("S")]);

    let mut add = FilterTag::new("Add");
    add.add_prefix(&[a.clone(), b]);
    assert_eq!(add.chain_description(), "(S -> A + S -> B) -> Add");

    let mut twice = FilterTag::new("Add");
    twice.add_prefix(&[a.clone(), a]);
    assert_eq!(twice.chain_description(), "S -> A -> Add");
}

#[test]
fn empty_tags_pass_descriptions_through() {
    let mut e = FilterTag::empty();
    e.add_prefix(&[FilterTag::new("Source")]);
    assert_eq!(e.chain_description(), "Source");
    assert_eq!(FilterTag::new("").label(), None);
}

#[test]
fn notes_follow_description() {
    let mut t = FilterTag::new("Source");
    t.add_note("Error in Gain:");
    assert_eq!(t.describe(), "Source\nError in Gain:");
    assert_eq!(t.to_string(), t.describe());
}
