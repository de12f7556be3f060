/// Text processing utilities
pub mod text {
    /// Cuts `text` to `max_chars` characters and appends `marker`, only when
    /// something was actually cut.
    pub fn truncate_with_marker(text: &str, max_chars: usize, marker: &str) -> String {
        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}{}", &text[..cut], marker),
            None => text.to_string(),
        }
    }

    /// First `max_chars` characters of `text`.
    pub fn take_chars(text: &str, max_chars: usize) -> &str {
        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => &text[..cut],
            None => text,
        }
    }

    /// Uppercases the first letter of every alphabetic run and lowercases the
    /// rest: `"AI"` -> `"Ai"`, `"machine learning"` -> `"Machine Learning"`.
    pub fn title_case(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut previous_is_letter = false;

        for c in text.chars() {
            if c.is_alphabetic() {
                if previous_is_letter {
                    out.extend(c.to_lowercase());
                } else {
                    out.extend(c.to_uppercase());
                }
                previous_is_letter = true;
            } else {
                out.push(c);
                previous_is_letter = false;
            }
        }

        out
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Only http(s) feeds can be fetched.
    pub fn is_valid_feed_url(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
            Err(_) => false,
        }
    }

    /// Connection string safe for logs.
    pub fn mask_password(url_str: &str) -> String {
        match Url::parse(url_str) {
            Ok(mut url) if url.password().is_some() => {
                if url.set_password(Some("***")).is_ok() {
                    url.to_string()
                } else {
                    "<unprintable connection string>".to_string()
                }
            }
            Ok(url) => url.to_string(),
            Err(_) => "<unparsable connection string>".to_string(),
        }
    }
}
