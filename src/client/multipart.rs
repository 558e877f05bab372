//! `multipart/form-data` body encoding (RFC 7578)

use ulid::Ulid;

#[derive(Debug, Clone)]
struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::with_boundary(format!("----cropcare{}", Ulid::new()))
    }
}

/// Header values cannot carry quotes or line breaks
fn escape_header_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect::<String>()
        .replace('"', "%22")
}

impl MultipartForm {
    pub(crate) fn with_boundary(boundary: String) -> Self {
        Self {
            boundary,
            parts: Vec::new(),
        }
    }

    pub(crate) fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parts.push(Part {
            name: name.to_string(),
            file_name: None,
            content_type: None,
            data: value.into().into_bytes(),
        });
        self
    }

    pub(crate) fn file(mut self, name: &str, file_name: &str, content_type: &str, data: Vec<u8>) -> Self {
        self.parts.push(Part {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            content_type: Some(content_type.to_string()),
            data,
        });
        self
    }

    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Text parts are written before file parts so small fields are never
    /// stuck behind a large upload.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let (files, texts): (Vec<&Part>, Vec<&Part>) =
            self.parts.iter().partition(|p| p.file_name.is_some());

        for part in texts.into_iter().chain(files) {
            body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            let mut disposition = format!(
                "Content-Disposition: form-data; name=\"{}\"",
                escape_header_value(&part.name)
            );
            if let Some(file_name) = &part.file_name {
                disposition.push_str(&format!("; filename=\"{}\"", escape_header_value(file_name)));
            }
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(content_type) = &part.content_type {
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(&part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_text_before_file_parts() {
        let form = MultipartForm::with_boundary("XYZ".to_string())
            .file("file", "leaf.jpg", "image/jpeg", vec![1, 2, 3])
            .text("plant_age", "30");
        let body = form.encode();

        let mut expected = Vec::new();
        expected.extend_from_slice(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"plant_age\"\r\n\r\n30\r\n",
        );
        expected.extend_from_slice(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"leaf.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
        );
        expected.extend_from_slice(&[1, 2, 3]);
        expected.extend_from_slice(b"\r\n--XYZ--\r\n");
        assert_eq!(body, expected);
        assert_eq!(form.content_type(), "multipart/form-data; boundary=XYZ");
    }

    #[test]
    fn file_names_are_sanitized() {
        let form = MultipartForm::with_boundary("B".to_string())
            .file("file", "a\"b\r\n.png", "image/png", Vec::new());
        let body = String::from_utf8(form.encode()).unwrap();
        assert!(body.contains("filename=\"a%22b.png\""));
    }

    #[test]
    fn default_boundaries_differ() {
        let a = MultipartForm::default();
        let b = MultipartForm::default();
        assert_ne!(a.content_type(), b.content_type());
    }
}
