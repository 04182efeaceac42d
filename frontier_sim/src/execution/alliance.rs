// Alliance bookkeeping: request, reply, break.
//
// A request records a pending `(requestor, recipient)` pair and notifies the
// recipient. The recipient's reply consumes the pending pair; acceptance
// forms the alliance, and either way the requestor is told. A reply with no
// pending request is ignored. Breaking an alliance notifies the other side.
// All three act on their first tick.

use log::warn;

use super::ExecCtx;
use crate::event::MessageType;
use crate::types::PlayerIdx;

fn name(ctx: &ExecCtx<'_>, idx: PlayerIdx) -> String {
    ctx.world
        .player(idx)
        .map_or_else(|| format!("{idx:?}"), |p| p.name.clone())
}

#[derive(Debug)]
pub struct AllianceRequestExecution {
    requestor: PlayerIdx,
    recipient: PlayerIdx,
    active: bool,
}

impl AllianceRequestExecution {
    pub fn new(requestor: PlayerIdx, recipient: PlayerIdx) -> Self {
        Self {
            requestor,
            recipient,
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
        if self.requestor == self.recipient || ctx.world.is_allied(self.requestor, self.recipient)
        {
            return;
        }
        if ctx.world.add_alliance_request(self.requestor, self.recipient) {
            let text = format!("{} requests an alliance", name(ctx, self.requestor));
            ctx.world
                .display_message(text, MessageType::Info, Some(self.recipient));
        }
    }
}

#[derive(Debug)]
pub struct AllianceReplyExecution {
    requestor: PlayerIdx,
    recipient: PlayerIdx,
    accept: bool,
    active: bool,
}

impl AllianceReplyExecution {
    pub fn new(requestor: PlayerIdx, recipient: PlayerIdx, accept: bool) -> Self {
        Self {
            requestor,
            recipient,
            accept,
            active: true,
        }
    }

    /// The replying player.
    pub fn owner(&self) -> PlayerIdx {
        self.recipient
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn init(&mut self, _ctx: &mut ExecCtx<'_>) {}

    pub fn tick(&mut self, ctx: &mut ExecCtx<'_>) {
        self.active = false;
        if !ctx
            .world
            .take_alliance_request(self.requestor, self.recipient)
        {
            warn!(
                "alliance reply from {:?} without a pending request",
                self.recipient
            );
            return;
        }
        let who = name(ctx, self.recipient);
        if self.accept {
            ctx.world.create_alliance(self.requestor, self.recipient);
            ctx.world.display_message(
                format!("{who} accepted your alliance request"),
                MessageType::Success,
                Some(self.requestor),
            );
        } else {
            ctx.world.display_message(
                format!("{who} rejected your alliance request"),
                MessageType::Warn,
                Some(self.requestor),
            );
        }
    }
}

#[derive(Debug)]
pub struct BreakAllianceExecution {
    requestor: PlayerIdx,
    recipient: PlayerIdx,
    active: bool,
}

impl BreakAllianceExecution {
    pub fn new(requestor: PlayerIdx, recipient: PlayerIdx) -> Self {
        Self {
            requestor,
            recipient,
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
        if ctx.world.break_alliance(self.requestor, self.recipient) {
            let text = format!("{} broke your alliance", name(ctx, self.requestor));
            ctx.world
                .display_message(text, MessageType::Error, Some(self.recipient));
        }
    }
}
