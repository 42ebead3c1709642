pub const EXTRACTION_SYSTEM: &str = include_str!("../data/prompts/extraction_system.txt");
pub const EXPLANATION_SYSTEM: &str = include_str!("../data/prompts/explanation_system.txt");
pub const EXPLANATION_USER: &str = include_str!("../data/prompts/explanation_user.txt");
pub const FOLLOW_UP_USER: &str = include_str!("../data/prompts/follow_up_user.txt");

/// Question used when a photo arrives without any text.
pub const DEFAULT_QUESTION: &str = "What is this product?";

pub const COLD_START_GUIDANCE: &str = "Hello! If you have a question about a product's nutrition, please share an image of the product, and I'll be happy to assist you.";

pub const GENERIC_ERROR_MESSAGE: &str =
    "Sorry, an error occurred while processing your request. Please try again.";

pub const NOTHING_TO_KEEP: &str = "Nothing to keep yet. Share a photo of a product first.";

/// Replace `{{key}}` placeholders in a template string.
///
/// Substitution is a single pass over the template: text inserted from a
/// value is never scanned again, so placeholders inside values stay literal.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            rest = &rest[start..];
            break;
        };
        let key = &after_open[..end];
        match vars.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => result.push_str(value),
            None => {
                result.push_str("{{");
                result.push_str(key);
                result.push_str("}}");
            }
        }
        rest = &after_open[end + 2..];
    }

    result.push_str(rest);
    result
}
