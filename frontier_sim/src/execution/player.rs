// One-shot player actions: donate troops, set a target, send an emoji,
// change the troop ratio.

use log::warn;

use super::ExecCtx;
use crate::event::{MessageType, SimEventKind};
use crate::types::PlayerIdx;

/// Troops from one ally to another. A null amount donates
/// `sender troops / donate_divisor`.
#[derive(Debug)]
pub struct DonateExecution {
    sender: PlayerIdx,
    recipient: PlayerIdx,
    troops: Option<u32>,
    active: bool,
}

impl DonateExecution {
    pub fn new(sender: PlayerIdx, recipient: PlayerIdx, troops: Option<u32>) -> Self {
        Self {
            sender,
            recipient,
            troops,
            active: true,
        }
    }

    pub fn owner(&self) -> PlayerIdx {
        self.sender
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn init(&mut self, _ctx: &mut ExecCtx<'_>) {}

    pub fn tick(&mut self, ctx: &mut ExecCtx<'_>) {
        self.active = false;
        if !ctx.world.is_allied(self.sender, self.recipient) {
            warn!(
                "player {:?} cannot donate to non-ally {:?}",
                self.sender, self.recipient
            );
            return;
        }
        let amount = self
            .troops
            .unwrap_or_else(|| ctx.config.donate_amount(ctx.world.troops(self.sender)));
        let moved = ctx.world.remove_troops(self.sender, amount);
        ctx.world.add_troops(self.recipient, moved);
        let from = ctx
            .world
            .player(self.sender)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        ctx.world.display_message(
            format!("Received {moved} troops from {from}"),
            MessageType::Success,
            Some(self.recipient),
        );
    }
}

#[derive(Debug)]
pub struct TargetPlayerExecution {
    requestor: PlayerIdx,
    target: PlayerIdx,
    active: bool,
}

impl TargetPlayerExecution {
    pub fn new(requestor: PlayerIdx, target: PlayerIdx) -> Self {
        Self {
            requestor,
            target,
            active: true,
        }
    }

    pub fn owner(&self) -> PlayerIdx {
        self.requestor
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn init(&mut self, _ctx: &mut ExecCtx<'_>) {}

    pub fn tick(&mut self, ctx: &mut ExecCtx<'_>) {
        self.active = false;
        if self.requestor != self.target {
            ctx.world.set_target(self.requestor, self.target);
        }
    }
}

/// `recipient: None` addresses every player.
#[derive(Debug)]
pub struct EmojiExecution {
    sender: PlayerIdx,
    recipient: Option<PlayerIdx>,
    emoji: String,
    active: bool,
}

impl EmojiExecution {
    pub fn new(sender: PlayerIdx, recipient: Option<PlayerIdx>, emoji: String) -> Self {
        Self {
            sender,
            recipient,
            emoji,
            active: true,
        }
    }

    pub fn owner(&self) -> PlayerIdx {
        self.sender
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn init(&mut self, _ctx: &mut ExecCtx<'_>) {}

    pub fn tick(&mut self, ctx: &mut ExecCtx<'_>) {
        self.active = false;
        ctx.world.emit(SimEventKind::Emoji {
            sender: self.sender,
            recipient: self.recipient,
            emoji: std::mem::take(&mut self.emoji),
        });
    }
}

#[derive(Debug)]
pub struct TroopRatioExecution {
    player: PlayerIdx,
    /// Thousandths.
    ratio: u32,
    active: bool,
}

impl TroopRatioExecution {
    /// `ratio` is a fraction in `[0, 1]`; it is stored in thousandths so the
    /// world holds no floats.
    pub fn new(player: PlayerIdx, ratio: f64) -> Self {
        let permille = (ratio.clamp(0.0, 1.0) * 1_000.0).round();
        Self {
            player,
            ratio: if permille.is_finite() { permille as u32 } else { 0 },
            active: true,
        }
    }

    pub fn owner(&self) -> PlayerIdx {
        self.player
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn init(&mut self, _ctx: &mut ExecCtx<'_>) {}

    pub fn tick(&mut self, ctx: &mut ExecCtx<'_>) {
        self.active = false;
        ctx.world.set_target_troop_ratio(self.player, self.ratio);
    }
}
