//! Catalogue of contract cases run against the catalog API.
//!
//! Every case is one request plus the outcome it accepts. Endpoints whose
//! answer depends on token scope list every status they tolerate.

use anyhow::{ensure, Context, Result};
use hyper::{
    header::{HeaderValue, AUTHORIZATION},
    Method,
};
use serde_json::Value;

use harness::fixtures::TestData;
use harness::request::{HttpResponse, RequestOptions};

pub type BodyCheck = fn(&HttpResponse) -> Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Use the run's bearer token.
    Default,
    /// Send an empty Authorization header.
    Omit,
    Override(&'static str),
}

#[derive(Debug, Clone)]
pub struct ContractCase {
    pub id: &'static str,
    pub description: &'static str,
    pub method: Method,
    /// Path template used to group response times, e.g. `/albums/{id}`.
    pub endpoint: &'static str,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub auth: AuthMode,
    pub accept: &'static [u16],
    pub expects_json: bool,
    pub within_ms: Option<u64>,
    pub check: Option<BodyCheck>,
}

impl ContractCase {
    fn new(
        id: &'static str,
        description: &'static str,
        method: Method,
        endpoint: &'static str,
        path: impl Into<String>,
    ) -> Self {
        ContractCase {
            id,
            description,
            method,
            endpoint,
            path: path.into(),
            query: Vec::new(),
            auth: AuthMode::Default,
            accept: &[200],
            expects_json: true,
            within_ms: None,
            check: None,
        }
    }

    fn get(
        id: &'static str,
        description: &'static str,
        endpoint: &'static str,
        path: impl Into<String>,
    ) -> Self {
        Self::new(id, description, Method::GET, endpoint, path)
    }

    fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    fn auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    fn accept(mut self, statuses: &'static [u16]) -> Self {
        self.accept = statuses;
        self
    }

    fn no_body(mut self) -> Self {
        self.expects_json = false;
        self
    }

    fn within_ms(mut self, limit: u64) -> Self {
        self.within_ms = Some(limit);
        self
    }

    fn check(mut self, check: BodyCheck) -> Self {
        self.check = Some(check);
        self
    }

    pub fn options(&self) -> RequestOptions {
        let mut options = RequestOptions::new();
        for (key, value) in &self.query {
            options = options.query(*key, value);
        }
        match self.auth {
            AuthMode::Default => options,
            AuthMode::Omit => options.header(AUTHORIZATION, HeaderValue::from_static("")),
            AuthMode::Override(value) => {
                options.header(AUTHORIZATION, HeaderValue::from_static(value))
            }
        }
    }
}

pub fn catalogue(data: &TestData) -> Vec<ContractCase> {
    let mut cases = smoke();
    cases.extend(albums(data));
    cases.extend(artists(data));
    cases.extend(tracks(data));
    cases.extend(playlists(data));
    cases.extend(account(data));
    cases
}

/// Splits `cases` into the ones whose id starts with `prefix` and the rest.
/// Without a prefix every case is selected.
pub fn select(
    cases: Vec<ContractCase>,
    prefix: Option<&str>,
) -> (Vec<ContractCase>, Vec<ContractCase>) {
    cases
        .into_iter()
        .partition(|c| prefix.map_or(true, |p| c.id.starts_with(p)))
}

fn smoke() -> Vec<ContractCase> {
    vec![
        ContractCase::get("ST-001", "request without token is rejected", "/me", "/me")
            .auth(AuthMode::Omit)
            .accept(&[400, 401]),
        ContractCase::get("ST-002", "request with invalid token is rejected", "/me", "/me")
            .auth(AuthMode::Override("Bearer invalid_token_xyz"))
            .accept(&[401]),
        ContractCase::get("ST-004", "search without query is a bad request", "/search", "/search")
            .query("type", "artist")
            .accept(&[400]),
        ContractCase::get(
            "ST-005",
            "unknown artist is not found",
            "/artists/{id}",
            "/artists/invalid_artist_id_xyz",
        )
        .accept(&[400, 404]),
        ContractCase::get(
            "ST-006",
            "unknown endpoint is not found",
            "/nonexistent-endpoint",
            "/nonexistent-endpoint",
        )
        .accept(&[404]),
        search("ST-007", "search answers with JSON"),
        search("ST-008", "search returns artist items").check(has_artist_items),
        search("ST-009", "search answers within five seconds").within_ms(5000),
        ContractCase::get("ST-010", "maximum page size is honoured", "/search", "/search")
            .query("q", "test")
            .query("type", "artist")
            .query("limit", 50)
            .check(at_most_fifty_items),
        ContractCase::get("ST-011", "high offset pages or is refused", "/search", "/search")
            .query("q", "test")
            .query("type", "artist")
            .query("limit", 10)
            .query("offset", 100)
            .accept(&[200, 400])
            .check(offset_is_hundred),
        ContractCase::get("ST-012", "query with accented characters", "/search", "/search")
            .query("q", "café ñ é")
            .query("type", "artist")
            .query("limit", 10),
        ContractCase::get("ST-013", "search across several types", "/search", "/search")
            .query("q", "test")
            .query("type", "artist,track,album")
            .query("limit", 5)
            .check(has_all_search_types),
        ContractCase::get("ST-014", "empty query returns an error body", "/search", "/search")
            .query("q", "")
            .query("type", "artist")
            .accept(&[400])
            .check(has_error_object),
        search("ST-016", "search result collections are not null").check(has_artist_items),
        search("ST-017", "search result field types").check(search_field_types),
        search("ST-018", "search result links are absolute").check(links_are_absolute),
    ]
}

fn search(id: &'static str, description: &'static str) -> ContractCase {
    ContractCase::get(id, description, "/search", "/search")
        .query("q", "test")
        .query("type", "artist")
        .query("limit", 1)
}

fn albums(data: &TestData) -> Vec<ContractCase> {
    let albums = &data.albums;
    vec![
        ContractCase::get(
            "TC-001",
            "single album by id",
            "/albums/{id}",
            format!("{}/{}", data.endpoints.albums, albums.valid_id),
        )
        .query("market", albums.market)
        .check(has_name),
        ContractCase::get(
            "TC-002",
            "invalid album id is a bad request",
            "/albums/{id}",
            format!("{}/{}", data.endpoints.albums, albums.invalid_id),
        )
        .query("market", albums.invalid_market)
        .accept(&[400]),
        ContractCase::get(
            "TC-003",
            "several albums by id",
            "/albums",
            data.endpoints.albums,
        )
        .query("ids", albums.valid_ids)
        .query("market", albums.market)
        .check(several_albums),
    ]
}

fn artists(data: &TestData) -> Vec<ContractCase> {
    let artists = &data.artists;
    vec![
        ContractCase::get("TC-011", "artist search by name", "/search", data.endpoints.artists)
            .query("q", artists.search_query)
            .query("type", artists.kind)
            .query("limit", artists.limit)
            .check(first_item_is_artist),
        ContractCase::get(
            "TC-013",
            "artist details",
            "/artists/{id}",
            format!("/artists/{}", artists.valid_id),
        )
        .check(artist_details),
        ContractCase::get(
            "TC-014",
            "invalid artist id",
            "/artists/{id}",
            format!("/artists/{}", artists.invalid_id),
        )
        .accept(&[400, 404]),
        ContractCase::get("TC-015", "several artists by id", "/artists", "/artists")
            .query("ids", artists.valid_ids)
            .check(artists_array),
        ContractCase::get(
            "TC-016",
            "artist top tracks",
            "/artists/{id}/top-tracks",
            format!("/artists/{}/top-tracks", artists.valid_id),
        )
        .query("market", data.users.market)
        .check(tracks_array),
        ContractCase::get(
            "TC-017",
            "artist albums page",
            "/artists/{id}/albums",
            format!("/artists/{}/albums", artists.valid_id),
        )
        .query("limit", 10)
        .query("offset", 0)
        .check(items_array),
    ]
}

fn tracks(data: &TestData) -> Vec<ContractCase> {
    let tracks = &data.tracks;
    vec![
        ContractCase::get(
            "TC-021",
            "single track by id",
            "/tracks/{id}",
            format!("/tracks/{}", tracks.valid_id),
        )
        .check(track_field_types),
        ContractCase::get("TC-023", "several tracks by id", "/tracks", "/tracks")
            .query("ids", tracks.valid_ids)
            .check(tracks_array),
        ContractCase::get("TC-024", "empty track query is a bad request", "/search", "/search")
            .query("q", "")
            .query("type", "track")
            .accept(&[400]),
    ]
}

fn playlists(data: &TestData) -> Vec<ContractCase> {
    let playlists = &data.playlists;
    vec![
        ContractCase::get("TC-031", "playlist search by name", "/search", "/search")
            .query("q", playlists.search_query)
            .query("type", playlists.kind)
            .query("limit", playlists.limit),
        // editorial playlists may be hidden from client-credential tokens
        ContractCase::get(
            "TC-035",
            "playlist images",
            "/playlists/{id}",
            format!("/playlists/{}", playlists.valid_id),
        )
        .accept(&[200, 404])
        .check(playlist_images),
        ContractCase::get(
            "TC-039",
            "invalid playlist id",
            "/playlists/{id}",
            format!("/playlists/{}", playlists.invalid_id),
        )
        .accept(&[400, 404]),
    ]
}

fn account(data: &TestData) -> Vec<ContractCase> {
    let endpoints = &data.endpoints;
    vec![
        ContractCase::get("TC-009", "current user profile", "/me", endpoints.me)
            .accept(&[200, 401, 403])
            .check(string_id_when_ok),
        ContractCase::get(
            "TC-010",
            "public user profile",
            "/users/{id}",
            format!("{}/{}", endpoints.users, data.users.public_user_id),
        )
        .check(user_profile),
        ContractCase::get("TC-018", "available devices", "/me/player/devices", endpoints.devices)
            .accept(&[200, 401, 403])
            .check(devices_when_ok),
        ContractCase::new(
            "TC-012",
            "pause playback",
            Method::PUT,
            "/me/player/pause",
            "/me/player/pause",
        )
        .accept(&[200, 204, 401, 403, 404])
        .no_body(),
    ]
}

fn json(response: &HttpResponse) -> Result<Value> {
    response.json().context("response body is not JSON")
}

fn at<'a>(value: &'a Value, pointer: &str) -> Result<&'a Value> {
    value
        .pointer(pointer)
        .with_context(|| format!("missing `{pointer}`"))
}

fn array<'a>(value: &'a Value, pointer: &str) -> Result<&'a Vec<Value>> {
    at(value, pointer)?
        .as_array()
        .with_context(|| format!("`{pointer}` is not an array"))
}

fn string<'a>(value: &'a Value, pointer: &str) -> Result<&'a str> {
    at(value, pointer)?
        .as_str()
        .with_context(|| format!("`{pointer}` is not a string"))
}

fn number(value: &Value, pointer: &str) -> Result<f64> {
    at(value, pointer)?
        .as_f64()
        .with_context(|| format!("`{pointer}` is not a number"))
}

fn has_artist_items(response: &HttpResponse) -> Result<()> {
    array(&json(response)?, "/artists/items")?;
    Ok(())
}

fn at_most_fifty_items(response: &HttpResponse) -> Result<()> {
    let body = json(response)?;
    let items = array(&body, "/artists/items")?;
    ensure!(items.len() <= 50, "{} items exceed the limit of 50", items.len());
    Ok(())
}

fn offset_is_hundred(response: &HttpResponse) -> Result<()> {
    if !response.status.is_success() {
        return Ok(());
    }
    let offset = number(&json(response)?, "/artists/offset")?;
    ensure!(offset == 100.0, "offset was {offset}, expected 100");
    Ok(())
}

fn has_all_search_types(response: &HttpResponse) -> Result<()> {
    let body = json(response)?;
    for kind in ["artists", "tracks", "albums"] {
        ensure!(body.get(kind).is_some_and(Value::is_object), "missing `{kind}`");
    }
    Ok(())
}

fn has_error_object(response: &HttpResponse) -> Result<()> {
    let body = json(response)?;
    ensure!(body.get("error").is_some(), "error body has no `error` field");
    Ok(())
}

fn search_field_types(response: &HttpResponse) -> Result<()> {
    let body = json(response)?;
    array(&body, "/artists/items")?;
    number(&body, "/artists/limit")?;
    number(&body, "/artists/offset")?;
    Ok(())
}

fn links_are_absolute(response: &HttpResponse) -> Result<()> {
    let body = json(response)?;
    let Some(artist) = array(&body, "/artists/items")?.first() else {
        return Ok(());
    };
    for pointer in ["/external_urls/spotify", "/href"] {
        if let Some(link) = artist.pointer(pointer).and_then(Value::as_str) {
            ensure!(
                link.starts_with("http://") || link.starts_with("https://"),
                "`{pointer}` is not absolute: {link}"
            );
        }
    }
    Ok(())
}

fn has_name(response: &HttpResponse) -> Result<()> {
    string(&json(response)?, "/name")?;
    Ok(())
}

fn several_albums(response: &HttpResponse) -> Result<()> {
    let body = json(response)?;
    let albums = array(&body, "/albums")?;
    ensure!(albums.len() > 1, "expected several albums, got {}", albums.len());
    Ok(())
}

fn first_item_is_artist(response: &HttpResponse) -> Result<()> {
    let body = json(response)?;
    if let Some(first) = array(&body, "/artists/items")?.first() {
        ensure!(string(first, "/type")? == "artist", "first item is not an artist");
    }
    Ok(())
}

fn artist_details(response: &HttpResponse) -> Result<()> {
    let body = json(response)?;
    string(&body, "/id")?;
    array(&body, "/genres")?;
    number(&body, "/popularity")?;
    number(&body, "/followers/total")?;
    Ok(())
}

fn artists_array(response: &HttpResponse) -> Result<()> {
    array(&json(response)?, "/artists")?;
    Ok(())
}

fn tracks_array(response: &HttpResponse) -> Result<()> {
    array(&json(response)?, "/tracks")?;
    Ok(())
}

fn items_array(response: &HttpResponse) -> Result<()> {
    array(&json(response)?, "/items")?;
    Ok(())
}

fn track_field_types(response: &HttpResponse) -> Result<()> {
    let body = json(response)?;
    string(&body, "/id")?;
    string(&body, "/name")?;
    number(&body, "/duration_ms")?;
    let popularity = number(&body, "/popularity")?;
    ensure!(
        (0.0..=100.0).contains(&popularity),
        "popularity {popularity} outside 0-100"
    );
    ensure!(
        at(&body, "/explicit")?.is_boolean(),
        "`/explicit` is not a boolean"
    );
    array(&body, "/artists")?;
    Ok(())
}

fn playlist_images(response: &HttpResponse) -> Result<()> {
    if !response.status.is_success() {
        return Ok(());
    }
    let body = json(response)?;
    for image in array(&body, "/images")? {
        for side in ["height", "width"] {
            let value = image.get(side).unwrap_or(&Value::Null);
            ensure!(
                value.is_null() || value.is_number(),
                "image `{side}` is neither null nor a number"
            );
        }
    }
    Ok(())
}

fn string_id_when_ok(response: &HttpResponse) -> Result<()> {
    if response.status.is_success() {
        string(&json(response)?, "/id")?;
    }
    Ok(())
}

fn user_profile(response: &HttpResponse) -> Result<()> {
    let body = json(response)?;
    string(&body, "/id")?;
    number(&body, "/followers/total")?;
    Ok(())
}

fn devices_when_ok(response: &HttpResponse) -> Result<()> {
    if response.status.is_success() {
        array(&json(response)?, "/devices")?;
    }
    Ok(())
}
