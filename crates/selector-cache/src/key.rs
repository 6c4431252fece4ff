use autoheal_core_types::ElementContext;

/// Cache key for a logical element: `selector|description`, refined by
/// whatever context the caller knows about the element.
pub fn contextual_key(selector: &str, description: &str, context: Option<&ElementContext>) -> String {
    let mut key = format!("{selector}|{description}");
    if let Some(context) = context {
        if let Some(parent) = &context.parent_container {
            key.push_str("|parent:");
            key.push_str(parent);
        }
        if let Some(position) = &context.relative_position {
            key.push_str(&format!("|pos:{},{}", position.x, position.y));
        }
        if !context.sibling_elements.is_empty() {
            key.push_str("|siblings:");
            key.push_str(&context.sibling_elements.join(","));
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use autoheal_core_types::Position;

    use super::*;

    #[test]
    fn test_plain_key() {
        assert_eq!(contextual_key("#login", "login button", None), "#login|login button");
    }

    #[test]
    fn test_key_with_full_context() {
        let context = ElementContext::new()
            .with_parent("form#auth")
            .with_position(Position::new(10, 20, 80, 30))
            .with_siblings(vec!["input".into(), "label".into()]);
        assert_eq!(
            contextual_key("#login", "login button", Some(&context)),
            "#login|login button|parent:form#auth|pos:10,20|siblings:input,label"
        );
    }

    #[test]
    fn test_empty_context_adds_nothing() {
        let context = ElementContext::new();
        assert_eq!(contextual_key("a", "b", Some(&context)), "a|b");
    }
}
