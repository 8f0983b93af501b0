//! Image URL extraction from the `Images` column
//!
//! Three grammars are accepted, possibly mixed in one cell:
//! - bare URLs separated by `|`, newlines or commas
//! - markup with `src="..."` / `data-src="..."` attributes
//! - URLs ending in an image extension anywhere in free text
//!
//! Results are ordered by position in the cell and deduplicated, keeping the
//! first occurrence.

use regex::Regex;

#[derive(Debug, Clone)]
pub struct UrlExtractor {
    attribute: Regex,
    separator: Regex,
    glued: Regex,
    bare: Regex,
    free_text: Regex,
}

/// A candidate URL and the byte span it came from
#[derive(Debug, Clone)]
struct Candidate {
    start: usize,
    end: usize,
    url: String,
}

impl UrlExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            attribute: Regex::new(r#"(?i)\b(?:data-src|src)\s*=\s*["']([^"']+)["']"#)?,
            separator: Regex::new(r"\||\r?\n|,\s+")?,
            glued: Regex::new(r"(?i),https?://")?,
            bare: Regex::new(r"(?i)^https?://\S+$")?,
            free_text: Regex::new(
                r#"(?i)https?://[^\s"'<>|]+?\.(?:jpe?g|png|gif|webp|bmp|tiff?|avif)\b(?:\?[^\s"'<>|,]*)?"#,
            )?,
        })
    }

    /// All image URLs in `cell`, in order of first appearance
    pub fn extract(&self, cell: &str) -> Vec<String> {
        if cell.trim().is_empty() {
            return Vec::new();
        }

        let mut candidates = self.markup_candidates(cell);
        candidates.extend(self.bare_candidates(cell));

        for m in self.free_text.find_iter(cell) {
            let overlaps = candidates
                .iter()
                .any(|c| m.start() < c.end && c.start < m.end());
            if !overlaps {
                candidates.push(Candidate {
                    start: m.start(),
                    end: m.end(),
                    url: m.as_str().to_string(),
                });
            }
        }

        candidates.sort_by_key(|c| c.start);

        let mut urls: Vec<String> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !urls.contains(&candidate.url) {
                urls.push(candidate.url);
            }
        }
        urls
    }

    fn markup_candidates(&self, cell: &str) -> Vec<Candidate> {
        self.attribute
            .captures_iter(cell)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| {
                let raw = m.as_str().trim();
                let url = if raw.starts_with("//") {
                    format!("https:{}", raw)
                } else {
                    raw.to_string()
                };
                self.bare.is_match(&url).then(|| Candidate {
                    start: m.start(),
                    end: m.end(),
                    url,
                })
            })
            .collect()
    }

    fn bare_candidates(&self, cell: &str) -> Vec<Candidate> {
        let mut out = Vec::new();
        let mut piece_start = 0;

        let mut pieces: Vec<(usize, &str)> = Vec::new();
        for sep in self.separator.find_iter(cell) {
            pieces.push((piece_start, &cell[piece_start..sep.start()]));
            piece_start = sep.end();
        }
        pieces.push((piece_start, &cell[piece_start..]));

        for (offset, piece) in pieces {
            // "a.jpg,https://b.jpg" has no whitespace after the comma
            let mut cut = 0;
            for glued in self.glued.find_iter(piece) {
                self.push_token(&mut out, offset + cut, &piece[cut..glued.start()]);
                cut = glued.start() + 1;
            }
            self.push_token(&mut out, offset + cut, &piece[cut..]);
        }
        out
    }

    fn push_token(&self, out: &mut Vec<Candidate>, offset: usize, token: &str) {
        let leading = token.len() - token.trim_start().len();
        // Trailing list punctuation is never part of the URL
        let trimmed = token.trim().trim_end_matches([',', ';']).trim_end();
        let unquoted = trimmed.trim_matches(|c| c == '"' || c == '\'');
        if !self.bare.is_match(unquoted) {
            return;
        }
        let quote = trimmed.len() - trimmed.trim_start_matches(|c| c == '"' || c == '\'').len();
        let start = offset + leading + quote;
        out.push(Candidate {
            start,
            end: start + unquoted.len(),
            url: unquoted.to_string(),
        });
    }
}
