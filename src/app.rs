//! Deck orchestrator
//!
//! Wires the device, gateway, caches, and frame stack together, runs the
//! startup sequence, and owns the input event loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde_json::Value;

use crate::api::{ApiFetch, ApiGateway, AuthBroker, GameApi};
use crate::cache::{default_cache_root, AssetCache, AssetError, ManifestCache};
use crate::config::{Session, Settings};
use crate::device::{self, Device};
use crate::frames::{FrameSpec, FrameStack};
use crate::model::CharacterSummary;
use crate::render::RenderPipeline;

/// How long one event-loop pass waits for a key event
const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Shared services handed to frames and pollers. Cheap to clone; all
/// heavy members sit behind `Arc`.
#[derive(Clone)]
pub struct DeckContext {
    pub device: Arc<dyn Device>,
    pub api: Arc<dyn GameApi>,
    pub manifest: Arc<ManifestCache>,
    pub assets: Arc<AssetCache>,
    pub pipeline: Arc<RenderPipeline>,
    pub session: Arc<Session>,
    pub poll_interval: Duration,
}

impl DeckContext {
    /// Fetch an asset route through the cache, hitting the service only
    /// on first use
    pub fn fetch_asset(&self, route: &str) -> Result<Vec<u8>, AssetError> {
        self.assets.fetch(route, &ApiFetch(self.api.as_ref()))
    }
}

/// The running application
pub struct Deck {
    ctx: DeckContext,
    stack: FrameStack,
    broker: AuthBroker,
}

impl Deck {
    /// Construct everything that can fail at startup. Missing device and
    /// unusable cache directories are fatal here.
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let session = Arc::new(Session::load(Session::default_path()));
        let device = device::open_default(settings)?;
        let gateway = Arc::new(ApiGateway::new(settings, session.clone())?);

        let cache_root = settings
            .cache_dir
            .clone()
            .unwrap_or_else(default_cache_root);
        let manifest = Arc::new(
            ManifestCache::open(cache_root.clone())
                .with_context(|| format!("opening cache root {}", cache_root.display()))?,
        );
        let assets = Arc::new(AssetCache::open(cache_root.join("assets"))?);
        let pipeline = Arc::new(RenderPipeline::new(settings.font_path.as_deref()));

        let ctx = DeckContext {
            device,
            api: gateway,
            manifest,
            assets,
            pipeline,
            session,
            poll_interval: Duration::from_secs(settings.poll_interval_secs.max(1)),
        };
        let stack = FrameStack::new(ctx.clone());
        let broker = AuthBroker::new(settings);

        Ok(Self { ctx, stack, broker })
    }

    /// Startup sequence: current manifest, valid token, player identity,
    /// then the character selection screen
    pub fn bootstrap(&mut self) -> anyhow::Result<()> {
        self.refresh_manifest()?;

        self.broker
            .ensure_valid(&self.ctx.session)
            .context("auth flow failed")?;

        let characters = self.fetch_characters()?;
        log::info!("Signed in with {} character(s)", characters.len());

        self.stack
            .push(FrameSpec::CharacterSelect { characters })
            .context("could not open character selection")
    }

    /// Ask the service which manifest version is current and make the
    /// local snapshot match it
    fn refresh_manifest(&self) -> anyhow::Result<()> {
        log::info!("Fetching manifest data...");
        let info = self.ctx.api.get("/platform/manifest/")?;
        let version = info
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("manifest info missing `version`"))?;
        let content_route = info
            .pointer("/contentPaths/en")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("manifest info missing `contentPaths.en`"))?;

        self.ctx
            .manifest
            .ensure_current(version, content_route, &ApiFetch(self.ctx.api.as_ref()))
            .context("manifest rebuild failed")?;
        Ok(())
    }

    /// Resolve the signed-in account to a game membership and list its
    /// characters
    fn fetch_characters(&self) -> anyhow::Result<Vec<CharacterSummary>> {
        let account_id = self
            .ctx
            .session
            .account_id()
            .ok_or_else(|| anyhow!("no account id in session after auth"))?;

        let player = self
            .ctx
            .api
            .get(&format!("/platform/user/memberships/{}/", account_id))?;
        // The first membership is the one this app drives
        let membership = player
            .pointer("/memberships/0")
            .ok_or_else(|| anyhow!("account has no game memberships"))?;
        let membership_id = membership
            .get("membershipId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("membership missing `membershipId`"))?;
        let membership_type = membership
            .get("membershipType")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("membership missing `membershipType`"))?;
        self.ctx
            .session
            .set_membership(membership_id, membership_type)?;

        let profile = self.ctx.api.get(&format!(
            "/platform/profile/{}/{}/?components=200",
            membership_type, membership_id
        ))?;
        let characters = profile
            .pointer("/characters/data")
            .and_then(Value::as_object)
            .ok_or_else(|| anyhow!("profile missing character data"))?;

        characters
            .values()
            .map(|c| CharacterSummary::from_json(c).map_err(Into::into))
            .collect()
    }

    /// Input event loop. Runs until the stack empties out.
    pub fn run(&mut self) -> anyhow::Result<()> {
        loop {
            if let Some(event) = self.ctx.device.poll_key(INPUT_POLL_TIMEOUT)? {
                self.stack.dispatch(event.index, event.pressed);
            }
            if self.stack.is_empty() {
                log::info!("Frame stack empty, shutting down");
                return Ok(());
            }
        }
    }

    /// Release the device
    pub fn close(&mut self) {
        if let Err(e) = self.ctx.device.close() {
            log::warn!("Device close failed: {}", e);
        }
    }
}
