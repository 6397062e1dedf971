//! HTML pages rendered by the sharing server.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped when a file name is used as a relative link.
const LINK_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

/// The upload form served on GET in upload mode.
pub const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Quick Share Upload</title>
    <style>
        body { font-family: sans-serif; text-align: center; padding: 50px; }
        form { border: 2px dashed #ccc; padding: 20px; display: inline-block; }
        input { margin: 10px 0; }
        button { background-color: #007bff; color: white; padding: 10px 20px; border: none; cursor: pointer; }
        button:hover { background-color: #0056b3; }
    </style>
</head>
<body>
    <h2>Upload File to Host</h2>
    <form action="/" method="post" enctype="multipart/form-data">
        <input type="file" name="file" required /><br><br>
        <button type="submit">Upload</button>
    </form>
</body>
</html>
"#;

/// Escape text for inclusion in HTML element content or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Confirmation page shown after a successful upload.
pub fn upload_success(filename: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"UTF-8\"><title>Upload Successful</title></head>\n\
         <body>\n<h1>Upload Successful!</h1>\n<p>File saved as <b>{}</b></p>\n\
         <a href=\"/\">Upload another</a>\n</body>\n</html>\n",
        escape_html(filename)
    )
}

/// An entry shown in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Directory listing page for download mode.
///
/// `request_path` is the decoded URL path of the directory and is only used
/// for the heading; links are relative to it.
pub fn directory_listing(request_path: &str, entries: &[ListingEntry]) -> String {
    let mut items = String::new();
    if request_path != "/" {
        items.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for entry in entries {
        let suffix = if entry.is_dir { "/" } else { "" };
        items.push_str(&format!(
            "<li><a href=\"{}{suffix}\">{}{suffix}</a></li>\n",
            escape_html(&utf8_percent_encode(&entry.name, LINK_SEGMENT).to_string()),
            escape_html(&entry.name),
        ));
    }

    let title = escape_html(request_path);
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>Index of {title}</title>\n</head>\n<body>\n<h2>Index of {title}</h2>\n\
         <ul>\n{items}</ul>\n</body>\n</html>\n"
    )
}
