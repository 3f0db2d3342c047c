/// Builds a wa.me deep link that opens a chat with `phone` and the rendered
/// message prefilled. The phone may carry formatting punctuation; only its
/// digits end up in the link.
pub fn whatsapp_link(phone: &str, message: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    format!("https://wa.me/{}?text={}", digits, urlencoding::encode(message))
}
