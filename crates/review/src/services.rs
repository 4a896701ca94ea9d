//! Wires the review services together over one pool, gateway, and bus.

use std::sync::Arc;

use gatehouse_db::DbPool;
use gatehouse_events::EventBus;

use crate::bridge::BridgeManager;
use crate::claims::ClaimManager;
use crate::collaborators::Collaborators;
use crate::config::BridgeConfig;
use crate::decisions::DecisionEngine;
use crate::intake::Intake;
use crate::lookup::CaseLookup;
use crate::router::MessageRouter;
use crate::sets::{ForwardedSet, OpenChannelSet};
use crate::transcript::TranscriptRecorder;

/// Every service, sharing the process-local caches.
#[derive(Clone)]
pub struct ReviewServices {
    pub intake: Intake,
    pub lookup: CaseLookup,
    pub claims: ClaimManager,
    pub decisions: Arc<DecisionEngine>,
    pub bridge: Arc<BridgeManager>,
    pub router: Arc<MessageRouter>,
    pub transcripts: Arc<TranscriptRecorder>,
    pub forwarded: Arc<ForwardedSet>,
    pub open_channels: Arc<OpenChannelSet>,
}

impl ReviewServices {
    pub fn new(
        pool: DbPool,
        collaborators: Collaborators,
        bus: Arc<EventBus>,
        config: BridgeConfig,
    ) -> Self {
        let forwarded = Arc::new(ForwardedSet::default());
        let open_channels = Arc::new(OpenChannelSet::default());
        let transcripts = Arc::new(TranscriptRecorder::new(
            pool.clone(),
            collaborators.channels.clone(),
            bus.clone(),
            config.transcript_channel_id.clone(),
        ));
        let claims = ClaimManager::new(pool.clone(), collaborators.clone(), bus.clone());
        let bridge = Arc::new(BridgeManager::new(
            pool.clone(),
            collaborators.clone(),
            transcripts.clone(),
            open_channels.clone(),
            bus.clone(),
            config.clone(),
        ));
        let decisions = Arc::new(DecisionEngine::new(
            pool.clone(),
            collaborators.clone(),
            bridge.clone(),
            bus.clone(),
        ));
        let router = Arc::new(MessageRouter::new(
            pool.clone(),
            collaborators,
            claims.clone(),
            transcripts.clone(),
            open_channels.clone(),
            forwarded.clone(),
            config,
        ));

        Self {
            intake: Intake::new(pool.clone(), bus),
            lookup: CaseLookup::new(pool),
            claims,
            decisions,
            bridge,
            router,
            transcripts,
            forwarded,
            open_channels,
        }
    }
}
