//! Cache key layout
//!
//! User-supplied parts are percent-encoded so a filename can never collide
//! with the `:` separator.

use urlencoding::encode;

pub fn user_key(username: &str) -> String {
    format!("user:{}", encode(username))
}

pub fn progress_key(user_id: &str) -> String {
    format!("progress:{}", encode(user_id))
}

pub fn image_key(username: &str, filename: &str) -> String {
    format!("image:{}:{}", encode(username), encode(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(user_key("alice"), "user:alice");
        assert_eq!(progress_key("alice"), "progress:alice");
        assert_eq!(
            image_key("alice", "summer trip:1.jpg"),
            "image:alice:summer%20trip%3A1.jpg"
        );
    }
}
