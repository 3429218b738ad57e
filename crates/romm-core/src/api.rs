//! API facade. Layers the HTTP client and error classifier (and, for
//! callers that want coalesced background fetches, the latest-wins
//! worker) into catalog operations.

use crate::error::{classify, ErrorCategory, ErrorInfo};
use crate::http::{self, ConnectFn, Method, Request};
use crate::model::{Game, RomFile};
use serde::Deserialize;
use std::time::Duration;

const FIRST_PAGE_SIZE: u32 = 250;
const SUBSEQUENT_PAGE_SIZE: u32 = 500;
const SEARCH_THRESHOLD: usize = 2000;

pub struct ApiClient<'a> {
    pub connect: &'a ConnectFn,
    pub base_url: &'a str,
    pub timeout: Duration,
    pub auth: Option<(&'a str, &'a str)>,
}

#[derive(Debug, Deserialize)]
struct PlatformsResponse {
    platforms: Vec<PlatformDto>,
}

#[derive(Debug, Deserialize)]
struct PlatformDto {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct RomsPageResponse {
    items: Vec<GameDto>,
}

#[derive(Debug, Deserialize)]
struct GameDto {
    id: String,
    name: String,
    platform_id: String,
    platform_slug: String,
    #[serde(default)]
    fs_name: String,
    #[serde(default)]
    fs_name_no_tags: Option<String>,
    #[serde(default)]
    cover_url: Option<String>,
    #[serde(default)]
    file_size_bytes: u64,
}

impl From<GameDto> for Game {
    fn from(dto: GameDto) -> Self {
        Game {
            id: dto.id,
            title: dto.fs_name_no_tags.unwrap_or(dto.name),
            platform_id: dto.platform_id,
            platform_slug: dto.platform_slug,
            preferred_filename: dto.fs_name,
            preferred_file_id: None,
            cover_url: dto.cover_url,
            total_bytes: dto.file_size_bytes,
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdentifiersResponse {
    identifiers: Vec<IdentifierDto>,
}

#[derive(Debug, Deserialize)]
struct IdentifierDto {
    id: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    files: Vec<FileDto>,
}

#[derive(Debug, Deserialize)]
struct FileDto {
    id: String,
    name: String,
    #[serde(default)]
    relative_path: Option<String>,
    url: String,
    size: u64,
    #[serde(default)]
    category: String,
}

impl From<FileDto> for RomFile {
    fn from(dto: FileDto) -> Self {
        RomFile { id: dto.id, name: dto.name, relative_path: dto.relative_path, url: dto.url, size: dto.size, category: dto.category }
    }
}

fn get_json<T: for<'de> Deserialize<'de>>(client: &ApiClient, path_and_query: &str) -> Result<T, ErrorInfo> {
    let url = http::parse_url(&format!("{}{}", client.base_url, path_and_query))
        .map_err(|e| classify(&format!("parse: invalid url: {e}"), Some(ErrorCategory::Parse), None))?;
    let mut req = Request::new(Method::Get, url, client.timeout).with_header("Accept", "application/json");
    if let Some((u, p)) = client.auth {
        req = req.with_basic_auth(u, p);
    }
    let resp = http::perform_buffered(client.connect, &req, 16 * 1024 * 1024)?;
    if !(200..300).contains(&resp.headers.status_code) {
        return Err(classify("unexpected status", None, Some(resp.headers.status_code)));
    }
    serde_json::from_slice(&resp.body).map_err(|e| classify(&format!("parse: json: {e}"), Some(ErrorCategory::Parse), None))
}

impl<'a> ApiClient<'a> {
    pub fn fetch_platforms(&self) -> Result<Vec<String>, ErrorInfo> {
        let resp: PlatformsResponse = get_json(self, "/api/platforms")?;
        Ok(resp.platforms.into_iter().map(|p| p.slug).collect())
    }

    /// Fetch one page of roms for `platform_id`. `page` is zero-based; page
    /// 0 is the small "fast first paint" page, subsequent pages are larger.
    pub fn fetch_roms_page(&self, platform_id: &str, page: u32) -> Result<Vec<Game>, ErrorInfo> {
        let size = if page == 0 { FIRST_PAGE_SIZE } else { SUBSEQUENT_PAGE_SIZE };
        let offset = if page == 0 { 0 } else { FIRST_PAGE_SIZE + (page - 1) * SUBSEQUENT_PAGE_SIZE };
        let resp: RomsPageResponse = get_json(self, &format!("/api/roms?platform_id={platform_id}&limit={size}&offset={offset}"))?;
        Ok(resp.items.into_iter().map(Game::from).collect())
    }

    /// Fetch the lightweight identifiers endpoint and compute a stable
    /// digest over sorted `id|version` tokens.
    pub fn identifiers_digest(&self, platform_id: &str) -> Result<u64, ErrorInfo> {
        let resp: IdentifiersResponse = get_json(self, &format!("/api/platforms/{platform_id}/identifiers"))?;
        let mut tokens: Vec<String> = resp.identifiers.into_iter().map(|i| format!("{}|{}", i.id, i.version)).collect();
        tokens.sort_unstable();
        Ok(fnv1a64(tokens.join("\n").as_bytes()))
    }

    pub fn enrich_with_files(&self, rom_id: &str) -> Result<Vec<RomFile>, ErrorInfo> {
        let resp: FilesResponse = get_json(self, &format!("/api/roms/{rom_id}/files"))?;
        Ok(resp.files.into_iter().map(RomFile::from).collect())
    }

    /// Remote search when the local all-roms list exceeds the threshold;
    /// callers fall back to local filtering on error.
    pub fn remote_search(&self, platform_id: &str, query: &str, local_count: usize) -> Result<Option<Vec<Game>>, ErrorInfo> {
        if local_count < SEARCH_THRESHOLD {
            return Ok(None);
        }
        let resp: RomsPageResponse = get_json(self, &format!("/api/roms?platform_id={platform_id}&q={}", percent_encode(query)))?;
        Ok(Some(resp.items.into_iter().map(Game::from).collect()))
    }
}

/// Absolute URL construction: percent-encodes everything except the
/// unreserved set `:/?&=%~-_.`.
pub fn percent_encode(input: &str) -> String {
    const SAFE: &[u8] = b":/?&=%~-_.";
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        let is_unreserved = byte.is_ascii_alphanumeric() || SAFE.contains(&byte);
        if is_unreserved {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

pub fn fnv1a64(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_known_vector_for_empty_input() {
        assert_eq!(fnv1a64(b""), FNV_OFFSET_BASIS);
    }

    #[test]
    fn fnv1a_is_order_sensitive() {
        assert_ne!(fnv1a64(b"ab"), fnv1a64(b"ba"));
    }

    #[test]
    fn percent_encode_preserves_unreserved_set() {
        assert_eq!(percent_encode("a:b/c?d&e=f%g~h-i_j.k"), "a:b/c?d&e=f%g~h-i_j.k");
    }

    #[test]
    fn percent_encode_escapes_space_and_unicode_bytes() {
        assert_eq!(percent_encode("a b"), "a%20b");
        assert!(percent_encode("café").contains("%C3%A9"));
    }

    #[test]
    fn remote_search_skips_request_under_threshold() {
        let connect: Box<ConnectFn> = Box::new(|_h, _p, _t| Err(std::io::Error::from(std::io::ErrorKind::Other)));
        let client = ApiClient { connect: connect.as_ref(), base_url: "http://h", timeout: Duration::from_secs(1), auth: None };
        let result = client.remote_search("switch", "mario", 10).unwrap();
        assert!(result.is_none());
    }
}
