//! Markdown rendering for outbound messages.
//!
//! The platform displays the `markdown` field of a message, so every body is
//! rendered through pulldown-cmark before sending. Single newlines become
//! `<br />` (chat users expect line breaks to survive) and fenced code blocks
//! are rendered as `<pre><code>`.

use pulldown_cmark::{Event, Options, Parser, html};

pub fn render(body: &str) -> String {
  let parser = Parser::new_ext(body, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES)
    .map(|event| match event {
      Event::SoftBreak => Event::HardBreak,
      other => other,
    });

  let mut out = String::with_capacity(body.len() + body.len() / 2);
  html::push_html(&mut out, parser);
  let len = out.trim_end().len();
  out.truncate(len);
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn newlines_become_breaks() {
    assert_eq!(render("line one\nline two"), "<p>line one<br />\nline two</p>");
  }

  #[test]
  fn fenced_code_block() {
    let html = render("look:\n\n```python\nprint(1)\n```");
    assert!(html.starts_with("<p>look:</p>"));
    assert!(html.contains(r#"<pre><code class="language-python">print(1)"#));
    assert!(html.ends_with("</code></pre>"));
  }

  #[test]
  fn inline_formatting() {
    assert_eq!(render("**bold** and `code`"), "<p><strong>bold</strong> and <code>code</code></p>");
  }

  #[test]
  fn empty_body() {
    assert_eq!(render(""), "");
  }
}
