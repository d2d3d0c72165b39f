use crate::directory::NewDirectoryUser;
use crate::error::SourceError;
use std::fs;
use std::path::Path;

/// A header-addressed CSV table. Handles commas, double-quoted fields and `""`
/// escapes; multi-line quoted fields are not supported.
#[derive(Debug, Clone)]
pub struct Roster {
    source: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// One recipient of a secure-share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecipient {
    pub email: String,
    pub link: String,
    pub name: Option<String>,
}

impl Roster {
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let contents = fs::read_to_string(path).map_err(|e| SourceError::Roster {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&path.display().to_string(), &contents)
    }

    pub fn parse(source: &str, contents: &str) -> Result<Self, SourceError> {
        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
        let mut lines = contents.lines().filter(|l| !l.trim().is_empty());

        let headers = lines
            .next()
            .map(split_line)
            .ok_or_else(|| SourceError::Roster {
                path: source.to_string(),
                message: "file is empty".into(),
            })?
            .into_iter()
            .map(|h| normalize_header(&h))
            .collect();

        Ok(Self {
            source: source.to_string(),
            headers,
            rows: lines.map(split_line).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first header matching any of `names` (case and separator insensitive).
    pub fn column(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|name| {
            let wanted = normalize_header(name);
            self.headers.iter().position(|h| *h == wanted)
        })
    }

    fn require_column(&self, names: &[&str]) -> Result<usize, SourceError> {
        self.column(names).ok_or_else(|| SourceError::Roster {
            path: self.source.clone(),
            message: format!("missing required column `{}`", names[0]),
        })
    }

    fn cell(row: &[String], index: Option<usize>) -> Option<String> {
        index
            .and_then(|i| row.get(i))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn link_recipients(&self) -> Result<Vec<LinkRecipient>, SourceError> {
        let email_col = self.require_column(&["email", "mail", "email_address"])?;
        let link_col = self.require_column(&["link", "url", "send_link"])?;
        let name_col = self.column(&["name", "first_name", "display_name"]);

        let mut recipients = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.iter().enumerate() {
            let line = index + 2;
            let (Some(email), Some(link)) = (
                Self::cell(row, Some(email_col)),
                Self::cell(row, Some(link_col)),
            ) else {
                tracing::warn!(source = self.source.as_str(), line, "skipping row without email or link");
                continue;
            };
            recipients.push(LinkRecipient {
                email,
                link,
                name: Self::cell(row, name_col),
            });
        }
        Ok(recipients)
    }

    pub fn directory_users(
        &self,
        default_group: Option<&str>,
    ) -> Result<Vec<NewDirectoryUser>, SourceError> {
        let email_col = self.require_column(&["email", "mail", "email_address"])?;
        let first_col = self.require_column(&["first_name", "firstname", "given_name"])?;
        let last_col = self.require_column(&["last_name", "lastname", "surname", "family_name"])?;
        let user_col = self.column(&["user_name", "username", "login"]);
        let group_col = self.column(&["group", "group_name"]);

        let mut users = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.iter().enumerate() {
            let line = index + 2;
            let (Some(email), Some(first_name), Some(last_name)) = (
                Self::cell(row, Some(email_col)),
                Self::cell(row, Some(first_col)),
                Self::cell(row, Some(last_col)),
            ) else {
                tracing::warn!(source = self.source.as_str(), line, "skipping incomplete row");
                continue;
            };
            let user_name = Self::cell(row, user_col).unwrap_or_else(|| default_user_name(&email));
            let group = Self::cell(row, group_col).or_else(|| default_group.map(ToString::to_string));
            users.push(NewDirectoryUser {
                user_name,
                email,
                first_name,
                last_name,
                group,
            });
        }
        Ok(users)
    }
}

/// Local part of the email address.
fn default_user_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

fn normalize_header(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
