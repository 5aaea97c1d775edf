//! Classes and their timetable.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config;

const DATA_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";
const MEGABYTE: usize = 1024 * 1024;

/// Accepted uploads and the extension used when they are downloaded.
const DOCUMENT_TYPES: [(&str, &str); 5] = [
    ("application/pdf", "pdf"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    ("application/vnd.ms-excel", "xls"),
    ("application/msword", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
];

/// Base name of a downloaded timetable.
pub const DOWNLOAD_NAME: &str = "Emploi_Du_Temps";

#[derive(Debug, thiserror::Error)]
pub enum TimetableError {
    #[error("please provide a link or a file")]
    Empty,
    #[error("link is invalid: {0}")]
    Url(#[from] url::ParseError),
    #[error("only http and https links are accepted, got {0}")]
    Scheme(String),
    #[error("uploaded file must be a base64 data URL")]
    DataUrl,
    #[error("uploaded file is not valid base64")]
    Base64(#[from] base64::DecodeError),
    #[error("unsupported file type {0}, expected Excel, PDF or Word")]
    UnsupportedType(String),
    #[error("file too large (max {}MB)", .max / MEGABYTE)]
    TooLarge { size: usize, max: usize },
}

/// Decoded uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Document {
    /// Download file name, based on the MIME type.
    pub fn file_name(&self) -> String {
        let extension = DOCUMENT_TYPES
            .iter()
            .find(|(mime, _)| *mime == self.mime)
            .map(|(_, extension)| *extension)
            .unwrap_or("bin");
        format!("{DOWNLOAD_NAME}.{extension}")
    }
}

/// Where a timetable lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Remote document.
    Link(Url),
    /// Uploaded document.
    Document(Document),
}

/// Timetable published for a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timetable {
    /// Link or `data:` URL, as provided by the uploader.
    pub url: String,
    pub updated_at: DateTime<Utc>,
}

impl Timetable {
    /// Validate a link or an uploaded `data:` URL.
    pub fn parse(
        source: &str,
        max_size: usize,
        now: DateTime<Utc>,
    ) -> Result<Self, TimetableError> {
        let source = source.trim();
        parse_source(source, max_size)?;

        Ok(Self {
            url: source.to_owned(),
            updated_at: now,
        })
    }

    /// Whether the timetable was uploaded rather than linked.
    pub fn is_data_file(&self) -> bool {
        self.url.starts_with(DATA_SCHEME)
    }

    /// Decode the stored source.
    pub fn source(&self) -> Result<Source, TimetableError> {
        parse_source(&self.url, usize::MAX)
    }
}

fn parse_source(source: &str, max_size: usize) -> Result<Source, TimetableError> {
    if source.is_empty() {
        return Err(TimetableError::Empty);
    }

    let Some(data) = source.strip_prefix(DATA_SCHEME) else {
        let url = Url::parse(source)?;
        return match url.scheme() {
            "http" | "https" => Ok(Source::Link(url)),
            scheme => Err(TimetableError::Scheme(scheme.to_owned())),
        };
    };

    let (header, payload) =
        data.split_once(',').ok_or(TimetableError::DataUrl)?;
    let mime = header
        .strip_suffix(BASE64_MARKER)
        .ok_or(TimetableError::DataUrl)?
        .to_ascii_lowercase();

    if !DOCUMENT_TYPES.iter().any(|(accepted, _)| *accepted == mime) {
        return Err(TimetableError::UnsupportedType(mime));
    }

    // Reject before decoding, base64 grows data by 4/3.
    let estimated = payload.len() / 4 * 3;
    if estimated > max_size.saturating_add(3) {
        return Err(TimetableError::TooLarge {
            size: estimated,
            max: max_size,
        });
    }

    let bytes = STANDARD.decode(payload)?;
    if bytes.len() > max_size {
        return Err(TimetableError::TooLarge {
            size: bytes.len(),
            max: max_size,
        });
    }

    Ok(Source::Document(Document { mime, bytes }))
}

/// Class and its resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    pub timetable: Option<Timetable>,
}

/// Class data, shared between requests.
#[derive(Debug, Default)]
pub struct ClassStore {
    classes: DashMap<String, Class>,
}

impl ClassStore {
    /// Create a new [`ClassStore`].
    pub fn new(classes: impl IntoIterator<Item = config::Class>) -> Self {
        let classes = classes
            .into_iter()
            .map(|class| {
                (
                    class.id.clone(),
                    Class {
                        id: class.id,
                        name: class.name,
                        timetable: None,
                    },
                )
            })
            .collect();

        Self { classes }
    }

    /// Every class, sorted by identifier.
    pub fn list(&self) -> Vec<Class> {
        let mut classes: Vec<Class> =
            self.classes.iter().map(|class| class.clone()).collect();
        classes.sort_by(|a, b| a.id.cmp(&b.id));
        classes
    }

    pub fn get(&self, id: &str) -> Option<Class> {
        self.classes.get(id).map(|class| class.clone())
    }

    /// Publish a timetable. Returns `None` if the class is unknown.
    pub fn set_timetable(&self, id: &str, timetable: Timetable) -> Option<Class> {
        let mut class = self.classes.get_mut(id)?;
        class.timetable = Some(timetable);
        Some(class.clone())
    }

    /// Remove the timetable. Returns `None` if the class is unknown.
    pub fn delete_timetable(&self, id: &str) -> Option<Class> {
        let mut class = self.classes.get_mut(id)?;
        class.timetable = None;
        Some(class.clone())
    }
}
