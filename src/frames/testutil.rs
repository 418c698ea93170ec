//! Shared fixtures for frame and poller tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use std::fs;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::api::{ApiError, GameApi, HttpMethod};
use crate::app::DeckContext;
use crate::cache::{AssetCache, ManifestCache};
use crate::config::Session;
use crate::device::VirtualDeck;
use crate::model::CharacterSummary;
use crate::render::RenderPipeline;

/// Canned-response stand-in for the gateway
pub struct FakeApi {
    responses: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<(String, HttpMethod)>>,
    posts: Mutex<Vec<(String, Value)>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Register the JSON served for an exact route
    pub fn respond(&self, route: &str, value: Value) {
        self.responses.lock().insert(route.to_string(), value);
    }

    /// Routes hit via `call`, in order
    pub fn calls(&self) -> Vec<(String, HttpMethod)> {
        self.calls.lock().clone()
    }

    /// POSTed routes with their bodies, in order
    pub fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().clone()
    }

    /// Routes fetched as raw bytes, in order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

impl GameApi for FakeApi {
    fn call(
        &self,
        route: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        self.calls.lock().push((route.to_string(), method));
        if method == HttpMethod::Post {
            self.posts
                .lock()
                .push((route.to_string(), body.cloned().unwrap_or(Value::Null)));
        }
        self.responses
            .lock()
            .get(route)
            .cloned()
            .ok_or(ApiError::Status(404))
    }

    fn fetch_bytes(&self, route: &str) -> Result<Vec<u8>, ApiError> {
        self.fetched.lock().push(route.to_string());
        Ok(png_bytes([200, 40, 40]))
    }
}

/// A small solid-color PNG
pub fn png_bytes(color: [u8; 3]) -> Vec<u8> {
    let mut img = image::RgbaImage::new(8, 8);
    for pixel in img.pixels_mut() {
        *pixel = image::Rgba([color[0], color[1], color[2], 255]);
    }
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Definition tables every frame test leans on, installed as an
/// already-committed snapshot so no archive fetch is needed
pub fn seed_manifest(root: &Path) {
    fs::create_dir_all(root).unwrap();
    let conn = rusqlite::Connection::open(root.join("content.db")).unwrap();
    conn.execute_batch(
        "CREATE TABLE RaceDefinition (id INTEGER PRIMARY KEY, json BLOB);
         CREATE TABLE ClassDefinition (id INTEGER PRIMARY KEY, json BLOB);
         CREATE TABLE InventoryBucketDefinition (id INTEGER PRIMARY KEY, json BLOB);
         CREATE TABLE InventoryItemDefinition (id INTEGER PRIMARY KEY, json BLOB);",
    )
    .unwrap();

    let insert = |table: &str, id: i64, json: Value| {
        conn.execute(
            &format!("INSERT INTO {} (id, json) VALUES (?1, ?2)", table),
            rusqlite::params![id, json.to_string()],
        )
        .unwrap();
    };

    insert(
        "RaceDefinition",
        -1491684358,
        json!({"displayProperties": {"name": "Exo"}}),
    );
    insert(
        "ClassDefinition",
        300,
        json!({"displayProperties": {"name": "Warlock"}}),
    );

    // Three tracked buckets plus one outside the tracked slot range
    for (hash, index) in [(1000, 0), (2000, 1), (3000, 2), (9000, 7)] {
        insert(
            "InventoryBucketDefinition",
            hash,
            json!({"hash": hash, "index": index}),
        );
    }

    for item_hash in [111, 222, 333] {
        insert(
            "InventoryItemDefinition",
            item_hash,
            json!({
                "displayProperties": {
                    "name": format!("Item {}", item_hash),
                    "icon": format!("/icons/item-{}.png", item_hash),
                },
                "equippingBlock": {"ammoType": 1 + (item_hash % 3)},
            }),
        );
    }
    drop(conn);

    fs::write(
        root.join("version.json"),
        json!({"version": "v1", "content_table_id": "content.db"}).to_string(),
    )
    .unwrap();
}

/// A character the seeded manifest can describe
pub fn character(id: &str) -> CharacterSummary {
    CharacterSummary {
        character_id: id.to_string(),
        emblem_route: format!("/icons/emblem-{}.jpg", id),
        light: 1600,
        race_hash: 2803282938,
        class_hash: 300,
    }
}

/// A full context over a seeded manifest, a virtual deck, and the fake
/// gateway; the session is already signed in
pub fn test_context(dir: &Path, api: Arc<FakeApi>) -> (DeckContext, Arc<VirtualDeck>) {
    seed_manifest(dir);

    let session = Arc::new(Session::load(dir.join("session.json")));
    session.set_membership("m-1", 2).unwrap();

    let device = Arc::new(VirtualDeck::new(None));
    let ctx = DeckContext {
        device: device.clone(),
        api,
        manifest: Arc::new(ManifestCache::open(dir.to_path_buf()).unwrap()),
        assets: Arc::new(AssetCache::open(dir.join("assets")).unwrap()),
        pipeline: Arc::new(RenderPipeline::new(None)),
        session,
        poll_interval: Duration::from_millis(20),
    };
    (ctx, device)
}

/// The character view route the splash frame polls
pub fn character_view_route(character_id: &str) -> String {
    format!(
        "/platform/profile/2/m-1/character/{}/?components=201,205,300",
        character_id
    )
}

/// An inventory view payload with one equipped item per given bucket
pub fn inventory_view(equipped: &[(u32, u32, &str)], carried: &[(u32, u32, &str)]) -> Value {
    let items = |list: &[(u32, u32, &str)]| -> Vec<Value> {
        list.iter()
            .map(|(bucket, item_hash, instance)| {
                json!({
                    "itemHash": item_hash,
                    "itemInstanceId": instance,
                    "bucketHash": bucket,
                })
            })
            .collect()
    };
    let mut instances = serde_json::Map::new();
    for (_, _, instance) in equipped.iter().chain(carried.iter()) {
        instances.insert(
            instance.to_string(),
            json!({"damageType": 2, "primaryStat": {"value": 1540}}),
        );
    }
    json!({
        "equipment": {"data": {"items": items(equipped)}},
        "inventory": {"data": {"items": items(carried)}},
        "itemComponents": {"instances": {"data": instances}},
    })
}
