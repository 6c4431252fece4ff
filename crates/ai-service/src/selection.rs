use autoheal_core_types::WebElement;

/// Offline choice among several matches: the first element whose text
/// contains the description, then one whose aria-label, id or class does,
/// then the first element. Case-insensitive.
pub fn heuristic_pick<'a>(elements: &'a [WebElement], description: &str) -> Option<&'a WebElement> {
    let needle = description.trim().to_lowercase();
    if needle.is_empty() {
        return elements.first();
    }

    elements
        .iter()
        .find(|element| element.text.to_lowercase().contains(&needle))
        .or_else(|| {
            elements.iter().find(|element| {
                ["aria-label", "id", "class"].iter().any(|attr| {
                    element
                        .attribute(attr)
                        .is_some_and(|value| value.to_lowercase().contains(&needle))
                })
            })
        })
        .or_else(|| elements.first())
}
