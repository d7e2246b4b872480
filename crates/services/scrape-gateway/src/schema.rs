//! Query string validation
//!
//! Turns the flat query parameters of the scrape endpoints into typed engine
//! requests. Every offending field produces one [`FieldError`]; nothing is
//! handed to the engine unless the whole request is valid.
//!
//! | Field | Rule |
//! |-------|------|
//! | `type` | `movie` or `show` |
//! | `title` | non-empty |
//! | `releaseYear` | integer > 0 |
//! | `tmdbId`, `episodeTmdbId`, `seasonTmdbId` | ASCII digits |
//! | `episodeNumber`, `seasonNumber` | integer |

use std::collections::HashMap;
use std::sync::LazyLock;

use mediascrape_engine::media::{EmbedRequest, MediaPart, ScrapeMedia, SourceRequest};
use regex::Regex;
use serde::Serialize;

static TMDB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid tmdb id pattern"));

/// Validation failure of one query field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Raw query parameters
pub type QueryParams = HashMap<String, String>;

/// Collects field values and errors while reading a query
struct Fields<'a> {
    query: &'a QueryParams,
    errors: Vec<FieldError>,
}

impl<'a> Fields<'a> {
    fn new(query: &'a QueryParams) -> Self {
        Self {
            query,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn required(&mut self, field: &str) -> Option<&'a str> {
        match self.query.get(field) {
            Some(value) => Some(value.as_str()),
            None => {
                self.fail(field, "Required");
                None
            }
        }
    }

    fn string(&mut self, field: &str) -> Option<String> {
        self.required(field).map(str::to_string)
    }

    fn non_empty(&mut self, field: &str) -> Option<String> {
        let value = self.required(field)?;
        if value.is_empty() {
            self.fail(field, "String must contain at least 1 character(s)");
            return None;
        }
        Some(value.to_string())
    }

    fn tmdb_id(&mut self, field: &str) -> Option<String> {
        let value = self.required(field)?;
        if !TMDB_ID.is_match(value) {
            self.fail(field, "Invalid");
            return None;
        }
        Some(value.to_string())
    }

    fn integer(&mut self, field: &str) -> Option<i64> {
        let value = self.required(field)?;
        match coerce_integer(value) {
            Ok(n) => Some(n),
            Err(message) => {
                self.fail(field, message);
                None
            }
        }
    }

    fn release_year(&mut self, field: &str) -> Option<u32> {
        let n = self.integer(field)?;
        if n <= 0 {
            self.fail(field, "Number must be greater than 0");
            return None;
        }
        match u32::try_from(n) {
            Ok(year) => Some(year),
            Err(_) => {
                self.fail(field, "Number is out of range");
                None
            }
        }
    }

    fn part_number(&mut self, field: &str) -> Option<i32> {
        let n = self.integer(field)?;
        match i32::try_from(n) {
            Ok(number) => Some(number),
            Err(_) => {
                self.fail(field, "Number is out of range");
                None
            }
        }
    }

    fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }
}

/// Coerce a query value to an integer the way a numeric form field would be:
/// surrounding whitespace ignored, integral floats (`2e3`, `5.0`) accepted.
fn coerce_integer(raw: &str) -> Result<i64, &'static str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Expected number, received nan");
    }

    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(n);
    }

    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        Ok(f) if f.is_finite() => Err("Expected integer, received float"),
        _ => Err("Expected number, received nan"),
    }
}

/// Parse a movie/show scrape request
pub fn parse_scrape_media(query: &QueryParams) -> Result<ScrapeMedia, Vec<FieldError>> {
    let mut fields = Fields::new(query);
    let media = read_media(&mut fields);
    finish(fields, media)
}

/// Parse an embed request (`id`, `url`)
pub fn parse_embed_request(query: &QueryParams) -> Result<EmbedRequest, Vec<FieldError>> {
    let mut fields = Fields::new(query);
    let id = fields.string("id");
    let url = fields.string("url");

    let request = match (id, url) {
        (Some(id), Some(url)) => Some(EmbedRequest { id, url }),
        _ => None,
    };
    finish(fields, request)
}

/// Parse a source request: a scrape request plus the source `id`
pub fn parse_source_request(query: &QueryParams) -> Result<SourceRequest, Vec<FieldError>> {
    let mut fields = Fields::new(query);
    let media = read_media(&mut fields);
    let id = fields.string("id");

    let request = match (id, media) {
        (Some(id), Some(media)) => Some(SourceRequest { id, media }),
        _ => None,
    };
    finish(fields, request)
}

fn finish<T>(fields: Fields<'_>, value: Option<T>) -> Result<T, Vec<FieldError>> {
    let errors = fields.into_errors();
    match value {
        Some(value) if errors.is_empty() => Ok(value),
        _ => Err(errors),
    }
}

fn read_media(fields: &mut Fields<'_>) -> Option<ScrapeMedia> {
    let kind = fields.required("type")?;

    match kind {
        "movie" => {
            let title = fields.non_empty("title");
            let release_year = fields.release_year("releaseYear");
            let tmdb_id = fields.tmdb_id("tmdbId");

            Some(ScrapeMedia::Movie {
                title: title?,
                release_year: release_year?,
                tmdb_id: tmdb_id?,
            })
        }
        "show" => {
            let title = fields.non_empty("title");
            let release_year = fields.release_year("releaseYear");
            let tmdb_id = fields.tmdb_id("tmdbId");
            let episode_number = fields.part_number("episodeNumber");
            let episode_tmdb_id = fields.tmdb_id("episodeTmdbId");
            let season_number = fields.part_number("seasonNumber");
            let season_tmdb_id = fields.tmdb_id("seasonTmdbId");

            Some(ScrapeMedia::Show {
                title: title?,
                release_year: release_year?,
                tmdb_id: tmdb_id?,
                episode: MediaPart {
                    number: episode_number?,
                    tmdb_id: episode_tmdb_id?,
                },
                season: MediaPart {
                    number: season_number?,
                    tmdb_id: season_tmdb_id?,
                },
            })
        }
        _ => {
            fields.fail("type", "Invalid discriminator value. Expected 'movie' | 'show'");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fields_of(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_movie() {
        let media = parse_scrape_media(&query(&[
            ("type", "movie"),
            ("title", "Heat"),
            ("releaseYear", "1995"),
            ("tmdbId", "949"),
        ]))
        .unwrap();

        assert_eq!(
            media,
            ScrapeMedia::Movie {
                title: "Heat".to_string(),
                release_year: 1995,
                tmdb_id: "949".to_string(),
            }
        );
    }

    #[test]
    fn test_show_nests_episode_and_season() {
        let media = parse_scrape_media(&query(&[
            ("type", "show"),
            ("title", "Arcane"),
            ("releaseYear", " 2021 "),
            ("tmdbId", "94605"),
            ("episodeNumber", "3"),
            ("episodeTmdbId", "3247397"),
            ("seasonNumber", "1"),
            ("seasonTmdbId", "134187"),
        ]))
        .unwrap();

        match media {
            ScrapeMedia::Show {
                release_year,
                episode,
                season,
                ..
            } => {
                assert_eq!(release_year, 2021);
                assert_eq!(episode.number, 3);
                assert_eq!(episode.tmdb_id, "3247397");
                assert_eq!(season.number, 1);
                assert_eq!(season.tmdb_id, "134187");
            }
            other => panic!("expected show, got {:?}", other),
        }
    }

    #[test]
    fn test_movie_ignores_show_fields() {
        let media = parse_scrape_media(&query(&[
            ("type", "movie"),
            ("title", "Heat"),
            ("releaseYear", "1995"),
            ("tmdbId", "949"),
            ("episodeNumber", "not-a-number"),
        ]))
        .unwrap();
        assert_eq!(media.kind(), "movie");
    }

    #[test]
    fn test_one_error_per_offending_field() {
        let errors = parse_scrape_media(&query(&[
            ("type", "show"),
            ("title", ""),
            ("releaseYear", "0"),
            ("tmdbId", "tt0113277"),
            ("episodeNumber", "1.5"),
            ("seasonNumber", "1"),
            ("seasonTmdbId", "134187"),
        ]))
        .unwrap_err();

        assert_eq!(
            fields_of(&errors),
            vec!["title", "releaseYear", "tmdbId", "episodeNumber", "episodeTmdbId"]
        );
        assert_eq!(errors[4].message, "Required");
    }

    #[test]
    fn test_missing_or_unknown_type() {
        let errors = parse_scrape_media(&query(&[("title", "Heat")])).unwrap_err();
        assert_eq!(fields_of(&errors), vec!["type"]);

        let errors = parse_scrape_media(&query(&[("type", "anime")])).unwrap_err();
        assert_eq!(fields_of(&errors), vec!["type"]);
        assert!(errors[0].message.contains("discriminator"));
    }

    #[test]
    fn test_tmdb_id_rejects_non_ascii_digits() {
        let errors = parse_scrape_media(&query(&[
            ("type", "movie"),
            ("title", "Heat"),
            ("releaseYear", "1995"),
            ("tmdbId", "٩٤٩"),
        ]))
        .unwrap_err();
        assert_eq!(fields_of(&errors), vec!["tmdbId"]);
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(coerce_integer("42"), Ok(42));
        assert_eq!(coerce_integer(" 7 "), Ok(7));
        assert_eq!(coerce_integer("2e3"), Ok(2000));
        assert_eq!(coerce_integer("5.0"), Ok(5));
        assert!(coerce_integer("5.5").is_err());
        assert!(coerce_integer("").is_err());
        assert!(coerce_integer("abc").is_err());
        assert!(coerce_integer("inf").is_err());
    }

    #[test]
    fn test_embed_request() {
        let request = parse_embed_request(&query(&[
            ("id", "upcloud"),
            ("url", "https://upcloud.example/e/1"),
        ]))
        .unwrap();
        assert_eq!(request.id, "upcloud");

        let errors = parse_embed_request(&query(&[("id", "upcloud")])).unwrap_err();
        assert_eq!(fields_of(&errors), vec!["url"]);
    }

    #[test]
    fn test_source_request() {
        let request = parse_source_request(&query(&[
            ("id", "flixhq"),
            ("type", "movie"),
            ("title", "Heat"),
            ("releaseYear", "1995"),
            ("tmdbId", "949"),
        ]))
        .unwrap();
        assert_eq!(request.id, "flixhq");
        assert_eq!(request.media.tmdb_id(), "949");

        let errors = parse_source_request(&query(&[
            ("type", "movie"),
            ("title", "Heat"),
            ("releaseYear", "1995"),
            ("tmdbId", "949"),
        ]))
        .unwrap_err();
        assert_eq!(fields_of(&errors), vec!["id"]);
    }

    #[test]
    fn test_release_year_bounds() {
        let movie = |year: &str| {
            parse_scrape_media(&query(&[
                ("type", "movie"),
                ("title", "Heat"),
                ("releaseYear", year),
                ("tmdbId", "949"),
            ]))
        };

        let errors = movie("-3").unwrap_err();
        assert_eq!(errors[0].message, "Number must be greater than 0");

        let errors = movie("4294967296").unwrap_err();
        assert_eq!(fields_of(&errors), vec!["releaseYear"]);
        assert_eq!(errors[0].message, "Number is out of range");
    }
}
