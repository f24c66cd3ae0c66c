use roxmltree::Node;

pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

pub(crate) fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

pub(crate) fn descendant<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// `true` when the attribute is present and truthy (`1`/`true`).
pub(crate) fn flag(node: Node<'_, '_>, attr: &str) -> bool {
    node.attribute(attr)
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Boolean child element such as `<b/>` or `<i val="0"/>`.
pub(crate) fn toggle(node: Node<'_, '_>, name: &str) -> bool {
    child(node, name).is_some_and(|el| {
        el.attribute("val")
            .map_or(true, |v| v != "0" && !v.eq_ignore_ascii_case("false"))
    })
}

pub(crate) fn parsed<T: std::str::FromStr>(node: Node<'_, '_>, attr: &str) -> Option<T> {
    node.attribute(attr).and_then(|v| v.trim().parse().ok())
}

/// Attribute in any namespace, matched by local name only. Relationship ids
/// appear under both the transitional and strict namespaces.
pub(crate) fn namespaced_attribute<'a>(node: Node<'a, '_>, local: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.namespace().is_some() && a.name() == local)
        .map(|a| a.value())
}

/// Concatenated text of all `<t>` runs below `node`, skipping phonetic runs.
pub(crate) fn run_text(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    for t in node
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "t")
    {
        let in_phonetic = t
            .ancestors()
            .any(|a| a.is_element() && a.tag_name().name() == "rPh");
        if !in_phonetic {
            out.push_str(t.text().unwrap_or_default());
        }
    }
    out
}
