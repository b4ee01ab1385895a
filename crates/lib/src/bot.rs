//! Turn handler: one inbound message becomes one dialogue step plus, when the
//! step carries an action, one lookup against the e-commerce service.
//!
//! Lookup transport errors are caught here and answered with the corrective
//! reply; they never propagate past the turn.

use crate::channels::{ChannelHandle, InboundMessage, OutboundMessage};
use crate::clients::{self, order, product, OrderClient, ProductClient};
use crate::dialog::{self, Action};
use crate::state::FlowStore;
use anyhow::Result;
use std::sync::Arc;

/// Composition root for one conversation turn. Holds the injected flow store
/// and the two lookup clients; the channel handle arrives per turn.
pub struct Bot {
    flow_store: Arc<FlowStore>,
    order_client: OrderClient,
    product_client: ProductClient,
}

impl Bot {
    pub fn new(
        flow_store: Arc<FlowStore>,
        order_client: OrderClient,
        product_client: ProductClient,
    ) -> Self {
        Self {
            flow_store,
            order_client,
            product_client,
        }
    }

    /// Handle one turn: load flow, run the engine, persist the new flow,
    /// deliver the replies, then execute the lookup action if there is one.
    pub async fn handle_turn(
        &self,
        msg: &InboundMessage,
        channel: &dyn ChannelHandle,
    ) -> Result<()> {
        let flow = self
            .flow_store
            .get_or_default(&msg.channel_id, &msg.conversation_id)
            .await;
        let step = dialog::process(&flow, &msg.text);
        self.flow_store
            .set(&msg.channel_id, &msg.conversation_id, step.flow)
            .await;

        for reply in &step.replies {
            self.send(channel, &msg.conversation_id, reply).await?;
        }

        match step.action {
            Some(Action::LookupOrder(answer)) => {
                self.lookup_order(&answer, channel, &msg.conversation_id)
                    .await
            }
            Some(Action::LookupProduct(answer)) => {
                self.lookup_product(&answer, channel, &msg.conversation_id)
                    .await
            }
            None => Ok(()),
        }
    }

    async fn send(
        &self,
        channel: &dyn ChannelHandle,
        conversation_id: &str,
        message: &OutboundMessage,
    ) -> Result<()> {
        channel
            .send(conversation_id, message)
            .await
            .map_err(|e| anyhow::anyhow!("sending reply via {}: {}", channel.id(), e))
    }

    async fn lookup_order(
        &self,
        answer: &str,
        channel: &dyn ChannelHandle,
        conversation_id: &str,
    ) -> Result<()> {
        if !order::is_valid_order_id(answer) {
            return self
                .send(channel, conversation_id, &OutboundMessage::text(order::INVALID_ID))
                .await;
        }
        self.send(
            channel,
            conversation_id,
            &OutboundMessage::text(order::searching(answer)),
        )
        .await?;
        let reply = match self.order_client.fetch(answer).await {
            Ok(outcome) => {
                clients::render(&outcome, order::render_found, order::render_not_found(answer))
            }
            Err(e) => {
                log::error!("order lookup for {} failed: {}", answer, e);
                order::LOOKUP_FAILED.to_string()
            }
        };
        self.send(channel, conversation_id, &OutboundMessage::text(reply))
            .await
    }

    async fn lookup_product(
        &self,
        answer: &str,
        channel: &dyn ChannelHandle,
        conversation_id: &str,
    ) -> Result<()> {
        let Some((id, category)) = product::parse_product_answer(answer) else {
            return self
                .send(
                    channel,
                    conversation_id,
                    &OutboundMessage::text(product::FORMAT_HINT),
                )
                .await;
        };
        self.send(
            channel,
            conversation_id,
            &OutboundMessage::text(product::searching(&id)),
        )
        .await?;
        let reply = match self.product_client.fetch(&id, &category).await {
            Ok(outcome) => clients::render(
                &outcome,
                product::render_found,
                product::render_not_found(&id, &category),
            ),
            Err(e) => {
                log::error!("product lookup for {} failed: {}", id, e);
                product::FORMAT_HINT.to_string()
            }
        };
        self.send(channel, conversation_id, &OutboundMessage::text(reply))
            .await
    }
}
