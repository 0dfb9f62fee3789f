//! Minimal text PDF writer
//!
//! Lays pre-formatted lines onto Letter pages in a monospaced core font
//! (Courier), a fixed number of lines per page, with a page footer. No
//! embedded fonts, images or compression, so output stays byte-predictable.

pub const LINES_PER_PAGE: usize = 56;

const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;
const FONT_SIZE: u32 = 9;
const LEADING: u32 = 12;
const MARGIN_LEFT: u32 = 40;
const TOP: u32 = 752;
const FOOTER_Y: u32 = 30;

/// Render `lines` into a complete PDF document
pub fn text_pdf(lines: &[String]) -> Vec<u8> {
    let empty: &[String] = &[];
    let pages: Vec<&[String]> = if lines.is_empty() {
        vec![empty]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };
    let page_count = pages.len();

    let mut writer = PdfWriter::new();

    // 1: catalog, 2: page tree, 3: font, then (page, content) pairs from 4
    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    writer.object("<< /Type /Catalog /Pages 2 0 R >>");
    writer.object(&format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        page_count
    ));
    writer.object("<< /Type /Font /Subtype /Type1 /BaseFont /Courier /Encoding /WinAnsiEncoding >>");

    for (i, page_lines) in pages.iter().enumerate() {
        let content = page_content(page_lines, i + 1, page_count);
        writer.object(&format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            PAGE_WIDTH,
            PAGE_HEIGHT,
            5 + 2 * i
        ));
        writer.object(&format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    writer.finish()
}

fn page_content(lines: &[String], page: usize, page_count: usize) -> String {
    let mut content = format!(
        "BT\n/F1 {} Tf\n{} TL\n{} {} Td\n",
        FONT_SIZE, LEADING, MARGIN_LEFT, TOP
    );
    for line in lines {
        content.push_str(&format!("({}) Tj T*\n", escape(line)));
    }
    content.push_str("ET\n");
    content.push_str(&format!(
        "BT\n/F1 8 Tf\n{} {} Td\n(Page {} of {}) Tj\nET",
        MARGIN_LEFT, FOOTER_Y, page, page_count
    ));
    content
}

/// Escape a PDF string literal; anything outside printable ASCII becomes `?`
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            ' '..='~' => out.push(c),
            '\t' => out.push_str("    "),
            _ => out.push('?'),
        }
    }
    out
}

struct PdfWriter {
    out: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        Self {
            out: b"%PDF-1.4\n".to_vec(),
            offsets: Vec::new(),
        }
    }

    fn object(&mut self, body: &str) {
        self.offsets.push(self.out.len());
        let number = self.offsets.len();
        self.out
            .extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", number, body).as_bytes());
    }

    fn finish(mut self) -> Vec<u8> {
        let xref_offset = self.out.len();
        let size = self.offsets.len() + 1;

        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", size);
        for offset in &self.offsets {
            xref.push_str(&format!("{:010} 00000 n \n", offset));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, xref_offset
        ));

        self.out.extend_from_slice(xref.as_bytes());
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {}", i)).collect()
    }

    #[test]
    fn test_document_frame() {
        let pdf = text_pdf(&lines(3));
        let text = String::from_utf8(pdf).unwrap();
        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("(line 2) Tj T*"));
        assert!(text.contains("(Page 1 of 1) Tj"));
        assert!(text.contains("/BaseFont /Courier"));
    }

    #[test]
    fn test_pagination() {
        let pdf = String::from_utf8(text_pdf(&lines(LINES_PER_PAGE * 2 + 1))).unwrap();
        assert!(pdf.contains("/Count 3"));
        assert!(pdf.contains("/Kids [4 0 R 6 0 R 8 0 R]"));
        assert!(pdf.contains("(Page 3 of 3) Tj"));
    }

    #[test]
    fn test_empty_document_has_one_page() {
        let pdf = String::from_utf8(text_pdf(&[])).unwrap();
        assert!(pdf.contains("/Count 1"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let pdf = text_pdf(&lines(70));
        let text = String::from_utf8(pdf.clone()).unwrap();

        let xref_start = text.find("xref\n").unwrap();
        let entries: Vec<usize> = text[xref_start..]
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .map(|l| l[..10].parse().unwrap())
            .collect();

        // catalog, pages, font + 2 pages * (page, content)
        assert_eq!(entries.len(), 7);
        for (i, offset) in entries.iter().enumerate() {
            let expected = format!("{} 0 obj", i + 1);
            assert!(text[*offset..].starts_with(&expected), "object {} misplaced", i + 1);
        }

        let startxref: usize = text
            .lines()
            .skip_while(|l| *l != "startxref")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(startxref, xref_start);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("Total (USD) \\ net"), "Total \\(USD\\) \\\\ net");
        assert_eq!(escape("Caf\u{e9}"), "Caf?");
    }
}
