//! Static sample data and constant tables shared by contract cases.

use serde::Serialize;

use crate::{API_BASE_URL, REQ_TIMEOUT};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumFixtures {
    pub valid_id: &'static str,
    pub valid_ids: &'static str,
    pub invalid_id: &'static str,
    pub market: &'static str,
    pub invalid_market: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistFixtures {
    pub search_query: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub limit: u32,
    pub valid_id: &'static str,
    pub valid_ids: &'static str,
    pub invalid_id: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistFixtures {
    pub search_query: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub limit: u32,
    pub valid_id: &'static str,
    pub invalid_id: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackFixtures {
    pub valid_id: &'static str,
    pub valid_ids: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFixtures {
    pub public_user_id: &'static str,
    pub market: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointFixtures {
    pub albums: &'static str,
    pub artists: &'static str,
    pub me: &'static str,
    pub devices: &'static str,
    pub users: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestData {
    pub albums: AlbumFixtures,
    pub artists: ArtistFixtures,
    pub playlists: PlaylistFixtures,
    pub tracks: TrackFixtures,
    pub users: UserFixtures,
    pub endpoints: EndpointFixtures,
}

impl Default for TestData {
    fn default() -> Self {
        TestData {
            albums: AlbumFixtures {
                valid_id: "4aawyAB9vmqN3uQ7FjRGTy",
                valid_ids: "4aawyAB9vmqN3uQ7FjRGTy,382ObEPsp2rxGrnsizN5TX",
                invalid_id: "xxxxx",
                market: "US",
                invalid_market: "ZZ",
            },
            artists: ArtistFixtures {
                search_query: "Taylor Swift",
                kind: "artist",
                limit: 1,
                valid_id: "4gzpq5DPGxSnKTe4SA8HAU",
                valid_ids: "4gzpq5DPGxSnKTe4SA8HAU,1301WleyT98MSxVHPvPsT7",
                invalid_id: "invalid_artist_id_12345",
            },
            playlists: PlaylistFixtures {
                search_query: "workout",
                kind: "playlist",
                limit: 10,
                valid_id: "37i9dQZF1DXcBWIGoYBM5M",
                invalid_id: "invalid_playlist_id_xyz",
            },
            tracks: TrackFixtures {
                valid_id: "3n3Ppam7vgaVa1iaRUc9Lp",
                valid_ids: "3n3Ppam7vgaVa1iaRUc9Lp,2takcwffpFHUVo6b8tPYDy",
            },
            users: UserFixtures {
                public_user_id: "spotify",
                market: "US",
            },
            endpoints: EndpointFixtures {
                albums: "/albums",
                artists: "/search",
                me: "/me",
                devices: "/me/player/devices",
                users: "/users",
            },
        }
    }
}

/// One category of [`TestData`], as looked up by name.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum Fixture<'a> {
    Albums(&'a AlbumFixtures),
    Artists(&'a ArtistFixtures),
    Playlists(&'a PlaylistFixtures),
    Tracks(&'a TrackFixtures),
    Users(&'a UserFixtures),
    Endpoints(&'a EndpointFixtures),
}

impl TestData {
    pub fn category(&self, name: &str) -> Option<Fixture<'_>> {
        match name {
            "albums" => Some(Fixture::Albums(&self.albums)),
            "artists" => Some(Fixture::Artists(&self.artists)),
            "playlists" => Some(Fixture::Playlists(&self.playlists)),
            "tracks" => Some(Fixture::Tracks(&self.tracks)),
            "users" => Some(Fixture::Users(&self.users)),
            "endpoints" => Some(Fixture::Endpoints(&self.endpoints)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCodes {
    pub bad_request: u16,
    pub unauthorized: u16,
    pub forbidden: u16,
    pub not_found: u16,
    pub too_many_requests: u16,
    pub server_error: u16,
}

impl Default for ErrorCodes {
    fn default() -> Self {
        ErrorCodes {
            bad_request: 400,
            unauthorized: 401,
            forbidden: 403,
            not_found: 404,
            too_many_requests: 429,
            server_error: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validations {
    pub content_type_json: &'static str,
    pub max_response_time_ms: u64,
    pub min_response_time_ms: u64,
}

impl Default for Validations {
    fn default() -> Self {
        Validations {
            content_type_json: "application/json",
            max_response_time_ms: 1500,
            min_response_time_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub default_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: API_BASE_URL.to_string(),
            timeout_ms: REQ_TIMEOUT.as_millis() as u64,
            default_limit: 20,
        }
    }
}
