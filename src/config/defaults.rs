//! Default values for configuration fields.
//!
//! Each section gets its own submodule so `#[serde(default = "...")]`
//! attributes read naturally at the use site.

pub const fn r#true() -> bool {
    true
}

pub mod base {
    pub fn author() -> String {
        "<YOUR_NAME>".to_string()
    }

    pub fn email() -> String {
        "user@noreply.permafrost".to_string()
    }

    pub fn url() -> Option<String> {
        None
    }

    pub fn language() -> String {
        "en-US".to_string()
    }

    pub fn since() -> i32 {
        chrono::Datelike::year(&chrono::Utc::now())
    }
}

pub mod build {
    use std::path::PathBuf;

    pub fn src() -> Vec<PathBuf> {
        vec![PathBuf::from("src")]
    }

    pub fn public() -> PathBuf {
        PathBuf::from("public")
    }

    pub fn templates() -> PathBuf {
        PathBuf::from("src/templates")
    }

    pub fn output() -> PathBuf {
        PathBuf::from("dist")
    }

    pub fn uris() -> PathBuf {
        PathBuf::from("src/urls.txt")
    }

    pub fn cache_dir() -> String {
        "~/.cache/permafrost".to_string()
    }
}

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".to_string()
    }

    pub fn port() -> u16 {
        8100
    }
}
