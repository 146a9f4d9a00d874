//! Publication preconditions for a single post
//!
//! The remote publisher can only fetch images from a public address, needs a
//! caption, and must never touch posts a partner publishes by hand. Checks run
//! in that order and the first failure is reported.

use crate::types::{Post, ValidationResult};

/// Prefix of inline-encoded (data URI) images
pub const INLINE_IMAGE_PREFIX: &str = "data:";

pub const REASON_INVALID_IMAGE: &str = "Invalid or missing imageUrl (base64 not allowed)";
pub const REASON_EMPTY_CAPTION: &str = "Empty caption";
pub const REASON_CLIENT_MANAGED: &str = "Client-managed post";

/// Check whether a post can be published automatically
pub fn validate_post(post: &Post) -> ValidationResult {
    if post.image_url.is_empty() || post.image_url.starts_with(INLINE_IMAGE_PREFIX) {
        return ValidationResult::invalid(REASON_INVALID_IMAGE);
    }

    if post.caption.trim().is_empty() {
        return ValidationResult::invalid(REASON_EMPTY_CAPTION);
    }

    if post.is_client_managed() {
        return ValidationResult::invalid(REASON_CLIENT_MANAGED);
    }

    ValidationResult::valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_post() -> Post {
        Post {
            caption: "Hello".to_string(),
            image_url: "https://x/y.jpg".to_string(),
            ..Post::new("p1", "05/12")
        }
    }

    #[test]
    fn test_accepts_valid_post() {
        let result = validate_post(&valid_post());
        assert!(result.valid);
        assert!(result.reason.is_none());
    }

    #[test]
    fn test_accepts_explicit_not_client_managed() {
        let post = Post {
            is_client_managed: Some(false),
            ..valid_post()
        };
        assert!(validate_post(&post).valid);
    }

    #[test]
    fn test_rejects_inline_image_regardless_of_other_fields() {
        let variants = [
            Post {
                image_url: "data:image/jpeg;base64,AAAA".to_string(),
                ..valid_post()
            },
            Post {
                image_url: "data:".to_string(),
                caption: String::new(),
                ..valid_post()
            },
            Post {
                image_url: "data:image/png;base64,iVBOR".to_string(),
                is_client_managed: Some(true),
                published: true,
                ..valid_post()
            },
        ];

        for post in variants {
            let result = validate_post(&post);
            assert!(!result.valid);
            assert!(result.reason.unwrap().contains("imageUrl"));
        }
    }

    #[test]
    fn test_rejects_missing_image() {
        let post = Post {
            image_url: String::new(),
            ..valid_post()
        };
        let result = validate_post(&post);
        assert!(!result.valid);
        assert!(result.reason.unwrap().contains("imageUrl"));
    }

    #[test]
    fn test_rejects_blank_captions() {
        for caption in ["", " ", "\n\t  ", "\u{3000}"] {
            let post = Post {
                caption: caption.to_string(),
                ..valid_post()
            };
            let result = validate_post(&post);
            assert!(!result.valid, "caption {:?} should be rejected", caption);
            assert!(result.reason.unwrap().contains("caption"));
        }
    }

    #[test]
    fn test_rejects_client_managed() {
        let post = Post {
            is_client_managed: Some(true),
            ..valid_post()
        };
        let result = validate_post(&post);
        assert!(!result.valid);
        assert!(result.reason.unwrap().contains("Client-managed"));
    }

    #[test]
    fn test_image_failure_reported_before_caption_and_ownership() {
        let post = Post {
            image_url: "data:image/jpeg;base64,AAAA".to_string(),
            caption: "   ".to_string(),
            is_client_managed: Some(true),
            ..valid_post()
        };
        assert_eq!(
            validate_post(&post).reason.as_deref(),
            Some(REASON_INVALID_IMAGE)
        );
    }

    #[test]
    fn test_caption_failure_reported_before_ownership() {
        let post = Post {
            caption: String::new(),
            is_client_managed: Some(true),
            ..valid_post()
        };
        assert_eq!(
            validate_post(&post).reason.as_deref(),
            Some(REASON_EMPTY_CAPTION)
        );
    }

    #[test]
    fn test_image_check_is_prefix_only() {
        // "data:" elsewhere in the URL is fine
        let post = Post {
            image_url: "https://cdn.example.com/data:cache/a.jpg".to_string(),
            ..valid_post()
        };
        assert!(validate_post(&post).valid);
    }
}
