use crate::application_port::*;
use crate::domain_model::*;
use crate::server::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

const MAILBOX_CAP: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct ActorConfig {
    pub max_inflight_messages: usize,
    pub max_inflight_results: usize,
    pub max_worker_timeout_secs: u64,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            max_inflight_messages: 64,
            max_inflight_results: 1024,
            max_worker_timeout_secs: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid sender ID")]
    InvalidSender,
    #[error("Sender or receiver not found")]
    UserNotFound,
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Routes outbound events to the registered connections of their recipients
/// and authorizes inbound realtime calls against the connection's
/// token-derived identity.
#[derive(Clone)]
pub struct RealtimeDispatcher {
    registry: Arc<ConnectionRegistry>,
    user_service: Arc<dyn UserService>,
    message_service: Arc<dyn MessageService>,
    config: ActorConfig,
}

impl RealtimeDispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        user_service: Arc<dyn UserService>,
        message_service: Arc<dyn MessageService>,
    ) -> Self {
        Self {
            registry,
            user_service,
            message_service,
            config: ActorConfig::default(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Validate, persist, then fan out to both parties' connection sets.
    /// The sender's other devices get the echo too.
    pub async fn send_direct_message(
        &self,
        authenticated: UserId,
        request: SendMessage,
    ) -> Result<DirectMessageRecord, DispatchError> {
        // The transport does not reauthenticate payload fields; the
        // caller-asserted sender must match the token identity.
        if request.sender_id != authenticated {
            return Err(DispatchError::InvalidSender);
        }

        let sender_exists = self
            .user_service
            .exists(request.sender_id)
            .await
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        let receiver_exists = self
            .user_service
            .exists(request.receiver_id)
            .await
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        if !sender_exists || !receiver_exists {
            return Err(DispatchError::UserNotFound);
        }

        let record = self
            .message_service
            .send_message(request.sender_id, request.receiver_id, &request.content)
            .await?;

        let mut targets: HashSet<ConnectionId> = self
            .registry
            .members_of(request.receiver_id)
            .into_iter()
            .collect();
        targets.extend(self.registry.members_of(request.sender_id));

        self.push(targets, &S2CEvent::ReceiveMessage(record.clone()))
            .map_err(|e| DispatchError::Internal(e.to_string()))?;

        Ok(record)
    }

    fn push(
        &self,
        targets: impl IntoIterator<Item = ConnectionId>,
        event: &S2CEvent,
    ) -> anyhow::Result<()> {
        let json = serde_json::to_string(event)?;
        for connection_id in targets {
            self.registry
                .deliver(connection_id, ConnMessage::Text(json.clone()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationPublisher for RealtimeDispatcher {
    async fn publish(&self, notification: &NotificationRecord) -> anyhow::Result<()> {
        let members = self.registry.members_of(notification.recipient_id);
        if members.is_empty() {
            // Not an error: the row is stored, the client pulls it later.
            tracing::trace!(
                recipient = %notification.recipient_id,
                "no live connections for notification"
            );
            return Ok(());
        }

        self.push(members, &S2CEvent::ReceiveNotification(notification.clone()))
    }
}

// region connection acceptor

#[async_trait::async_trait]
impl ConnectionAcceptor for RealtimeDispatcher {
    async fn accept_connection(
        &self,
        s2c_channel: Box<dyn ConnSender>,
        c2s_channel: Box<dyn ConnReceiver>,
        user_id: UserId,
    ) -> anyhow::Result<()> {
        let connection_id = ConnectionId::new();
        let actor_cancel = CancellationToken::new();

        let (sender_control_tx, sender_control_rx) = tokio::sync::mpsc::channel(MAILBOX_CAP);
        let (sender_buffer_tx, sender_buffer_rx) = tokio::sync::mpsc::channel(MAILBOX_CAP);

        let notify = Arc::new(Notify::new());
        let actor_handle = tokio::spawn(client_actor(
            connection_id,
            user_id,
            s2c_channel,
            c2s_channel,
            sender_control_tx.clone(),
            sender_control_rx,
            sender_buffer_rx,
            self.clone(),
            actor_cancel.clone(),
            notify.clone(),
        ));

        let record = ClientRecord {
            user_id,
            control: sender_control_tx,
            mailbox: sender_buffer_tx,
            actor_handle: Mutex::new(Some(actor_handle)),
            cancellation_token: actor_cancel,
        };
        self.registry.insert_connection(connection_id, record);
        notify.notify_one();

        Ok(())
    }
}

async fn client_actor(
    connection_id: ConnectionId,
    user_id: UserId,
    s2c_channel: Box<dyn ConnSender>,
    c2s_channel: Box<dyn ConnReceiver>,
    sender_control_tx: Sender<ConnMessage>,
    sender_control_rx: Receiver<ConnMessage>,
    sender_data_rx: Receiver<ConnMessage>,
    dispatcher: RealtimeDispatcher,
    actor_cancel: CancellationToken,
    notify: Arc<Notify>,
) {
    notify.notified().await;
    tracing::info!("connection [{}] of user [{}] starting", connection_id, user_id);

    let registry = dispatcher.registry.clone();

    let sender_token = actor_cancel.clone();
    let sender_handle = tokio::spawn(outbound_sender(
        s2c_channel,
        sender_control_rx,
        sender_data_rx,
        sender_token,
    ));

    let receiver_token = actor_cancel.clone();
    let receiver_handle = tokio::spawn(inbound_receiver(
        connection_id,
        user_id,
        c2s_channel,
        sender_control_tx,
        dispatcher,
        receiver_token,
    ));

    let _ = tokio::select! {
        res = sender_handle => {
            tracing::debug!("sender task ended first ({connection_id}): {res:?}");
        },
        res = receiver_handle => {
            tracing::debug!("receiver task ended first ({connection_id}): {res:?}");
        }
    };

    // Disconnect reap: the record and all its memberships go together.
    registry.remove_connection(connection_id);
    tracing::debug!("live connections: {}", registry.connection_count());
}

async fn outbound_sender(
    mut s2c_channel: Box<dyn ConnSender>,
    mut sender_control_rx: Receiver<ConnMessage>,
    mut sender_data_rx: Receiver<ConnMessage>,
    actor_cancel: CancellationToken,
) {
    while let Some(msg) = tokio::select! {
        biased;
        _ = actor_cancel.cancelled() => None,
        m = sender_control_rx.recv() => m,
        m = sender_data_rx.recv() => m,
    } {
        tracing::trace!("outbound_sender: {:?}", msg);
        if s2c_channel.send(msg).await.is_err() {
            tracing::trace!("outbound_sender shutting down");
            actor_cancel.cancel();
            break;
        }
    }
}

async fn inbound_receiver(
    connection_id: ConnectionId,
    user_id: UserId,
    mut c2s_channel: Box<dyn ConnReceiver>,
    sender_control_tx: Sender<ConnMessage>,
    dispatcher: RealtimeDispatcher,
    actor_cancel: CancellationToken,
) {
    let config = dispatcher.config;
    let worker_sem = Arc::new(Semaphore::new(config.max_inflight_messages));
    let join_sem = Arc::new(Semaphore::new(config.max_inflight_results));

    let mut task_set = tokio::task::JoinSet::new();

    loop {
        let sender_control_tx = sender_control_tx.clone();
        let dispatcher = dispatcher.clone();
        let actor_cancel = actor_cancel.clone();

        tokio::select! {
            biased;

            _ = actor_cancel.cancelled() => {
                tracing::info!("connection [{}] shutdown by cancel", connection_id);
                break;
            },

            maybe_message = c2s_channel.next() => {
                let result = match maybe_message {
                    Some(result) => result,
                    None => break,  // connection closed
                };

                let conn_msg = match result {
                    Ok(m) => m,
                    Err(_) => break,  // low level error
                };

                let permit = match worker_sem.clone().try_acquire_owned() {
                    Ok(p) => p,
                    Err(_) => {
                        tracing::warn!("connection [{}] is throttled", connection_id);
                        let _ = send_soft_error(&sender_control_tx, "Too many messages").await;
                        continue;
                    }
                };

                let join_permit = match join_sem.try_acquire() {
                    Ok(p) => p,
                    Err(_) => {
                        tracing::warn!("connection [{}] join-backlog limit reached", connection_id);
                        continue;
                    }
                };
                join_permit.forget();

                task_set.spawn(async move {
                    let _permit_guard = permit;
                    let fut = handle_incoming_message(
                        connection_id,
                        user_id,
                        conn_msg,
                        sender_control_tx,
                        dispatcher,
                        actor_cancel.clone(),
                    );
                    let result = tokio::time::timeout(
                        Duration::from_secs(config.max_worker_timeout_secs),
                        fut,
                    ).await;
                    if result.is_err() {
                        tracing::warn!("worker timeout for connection [{}]", connection_id);
                    }
                });
            }

            Some(join_result) = task_set.join_next() => {
                if let Err(e) = join_result {
                    tracing::error!("worker panicked: {e}");
                }
                join_sem.add_permits(1);
            }
        }
    }

    actor_cancel.cancel();
    while task_set.join_next().await.is_some() {}
    tracing::info!("connection [{}] shutting down", connection_id);
}

async fn send_soft_error(
    sender_control_tx: &Sender<ConnMessage>,
    message: &str,
) -> anyhow::Result<()> {
    let event = S2CEvent::Error(SoftError {
        message: message.to_owned(),
    });
    sender_control_tx
        .send(ConnMessage::Text(serde_json::to_string(&event)?))
        .await?;
    Ok(())
}

async fn handle_incoming_message(
    connection_id: ConnectionId,
    user_id: UserId,
    conn_msg: ConnMessage,
    sender_control_tx: Sender<ConnMessage>,
    dispatcher: RealtimeDispatcher,
    actor_cancel: CancellationToken,
) -> anyhow::Result<()> {
    match conn_msg {
        ConnMessage::Text(t) => {
            let Ok(command) = serde_json::from_str::<C2SCommand>(&t) else {
                tracing::debug!("failed to deserialize command: {}", t);
                return send_soft_error(&sender_control_tx, "malformed message").await;
            };

            match command {
                C2SCommand::Join(join) => {
                    // A connection may only register under the identity it
                    // authenticated as.
                    if join.user_id != user_id {
                        return send_soft_error(&sender_control_tx, "Invalid user ID").await;
                    }
                    dispatcher.registry.join(connection_id, join.user_id);
                    Ok(())
                }
                C2SCommand::Leave(leave) => {
                    if leave.user_id != user_id {
                        return send_soft_error(&sender_control_tx, "Invalid user ID").await;
                    }
                    dispatcher.registry.leave(connection_id, leave.user_id);
                    Ok(())
                }
                C2SCommand::SendMessage(request) => {
                    match dispatcher.send_direct_message(user_id, request).await {
                        // Delivery to both parties happened inside; the echo
                        // event doubles as the acknowledgement.
                        Ok(_) => Ok(()),
                        Err(e) => send_soft_error(&sender_control_tx, &e.to_string()).await,
                    }
                }
            }
        }
        ConnMessage::Binary(_) => {
            tracing::error!("unexpected binary message on [{}]", connection_id);
            Ok(())
        }
        ConnMessage::Ping => {
            sender_control_tx.send(ConnMessage::Pong).await?;
            Ok(())
        }
        ConnMessage::Pong => {
            tracing::error!("unexpected pong on [{}]", connection_id);
            Ok(())
        }
        ConnMessage::Close => {
            actor_cancel.cancel();
            Ok(())
        }
    }
}

// endregion

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{FakeMessageService, FakeUserService};
    use chrono::Utc;
    use tokio::sync::mpsc::channel;
    use tokio::time::timeout;

    struct Harness {
        dispatcher: RealtimeDispatcher,
        message_service: Arc<FakeMessageService>,
    }

    fn harness() -> Harness {
        let registry = Arc::new(ConnectionRegistry::new());
        let user_service = Arc::new(FakeUserService::with_users(&[
            (UserId(1), "alice"),
            (UserId(2), "bob"),
        ]));
        let message_service = Arc::new(FakeMessageService::new());
        let dispatcher =
            RealtimeDispatcher::new(registry, user_service, message_service.clone());
        Harness {
            dispatcher,
            message_service,
        }
    }

    struct Client {
        tx: Sender<ConnMessage>,
        rx: Receiver<ConnMessage>,
    }

    impl Client {
        async fn send_command(&self, command: &C2SCommand) {
            self.tx
                .send(ConnMessage::Text(serde_json::to_string(command).unwrap()))
                .await
                .unwrap();
        }

        async fn next_event(&mut self) -> S2CEvent {
            loop {
                let msg = timeout(Duration::from_secs(2), self.rx.recv())
                    .await
                    .expect("timed out waiting for event")
                    .expect("connection closed");
                if let ConnMessage::Text(t) = msg {
                    return serde_json::from_str(&t).unwrap();
                }
            }
        }

        async fn expect_silence(&mut self) {
            let outcome = timeout(Duration::from_millis(300), self.rx.recv()).await;
            if let Ok(Some(msg)) = outcome {
                panic!("expected silence, got {msg:?}");
            }
        }
    }

    async fn connect(dispatcher: &RealtimeDispatcher, user_id: UserId) -> Client {
        let (s2c_tx, s2c_rx) = channel(64);
        let (c2s_tx, c2s_rx) = channel(64);
        dispatcher
            .accept_connection(Box::new(s2c_tx), Box::new(c2s_rx), user_id)
            .await
            .unwrap();
        Client {
            tx: c2s_tx,
            rx: s2c_rx,
        }
    }

    async fn connect_and_join(dispatcher: &RealtimeDispatcher, user_id: UserId) -> Client {
        let joined_before = dispatcher.registry().members_of(user_id).len();
        let client = connect(dispatcher, user_id).await;
        client
            .send_command(&C2SCommand::Join(JoinGroup { user_id }))
            .await;
        wait_until(|| dispatcher.registry().members_of(user_id).len() == joined_before + 1).await;
        client
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn notification_for(recipient: UserId) -> NotificationRecord {
        NotificationRecord {
            notification_id: NotificationId(1),
            recipient_id: recipient,
            sender_id: Some(UserId(2)),
            kind: NotificationKind::Like,
            target_id: Some(PostId(10)),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn join_then_dispatch_then_leave() {
        let h = harness();
        let mut alice = connect_and_join(&h.dispatcher, UserId(1)).await;

        h.dispatcher
            .publish(&notification_for(UserId(1)))
            .await
            .unwrap();
        match alice.next_event().await {
            S2CEvent::ReceiveNotification(n) => assert_eq!(n.recipient_id, UserId(1)),
            other => panic!("unexpected event: {other:?}"),
        }

        alice
            .send_command(&C2SCommand::Leave(LeaveGroup { user_id: UserId(1) }))
            .await;
        wait_until(|| h.dispatcher.registry().members_of(UserId(1)).is_empty()).await;

        h.dispatcher
            .publish(&notification_for(UserId(1)))
            .await
            .unwrap();
        alice.expect_silence().await;
    }

    #[tokio::test]
    async fn direct_message_reaches_both_parties() {
        let h = harness();
        let mut alice = connect_and_join(&h.dispatcher, UserId(1)).await;
        let mut bob = connect_and_join(&h.dispatcher, UserId(2)).await;

        alice
            .send_command(&C2SCommand::SendMessage(SendMessage {
                sender_id: UserId(1),
                receiver_id: UserId(2),
                content: "hi".to_string(),
            }))
            .await;

        for client in [&mut alice, &mut bob] {
            match client.next_event().await {
                S2CEvent::ReceiveMessage(m) => {
                    assert_eq!(m.sender_id, UserId(1));
                    assert_eq!(m.receiver_id, UserId(2));
                    assert_eq!(m.content, "hi");
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }

        assert_eq!(h.message_service.stored().len(), 1);
    }

    #[tokio::test]
    async fn multi_device_echo() {
        let h = harness();
        let mut phone = connect_and_join(&h.dispatcher, UserId(1)).await;
        let mut laptop = connect_and_join(&h.dispatcher, UserId(1)).await;
        let mut bob = connect_and_join(&h.dispatcher, UserId(2)).await;

        phone
            .send_command(&C2SCommand::SendMessage(SendMessage {
                sender_id: UserId(1),
                receiver_id: UserId(2),
                content: "from the phone".to_string(),
            }))
            .await;

        for client in [&mut phone, &mut laptop, &mut bob] {
            match client.next_event().await {
                S2CEvent::ReceiveMessage(m) => assert_eq!(m.content, "from the phone"),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn spoofed_sender_is_rejected_and_nothing_is_delivered() {
        let h = harness();
        let mut alice = connect_and_join(&h.dispatcher, UserId(1)).await;
        let mut bob = connect_and_join(&h.dispatcher, UserId(2)).await;

        // authenticated as 1, claiming to be 2
        alice
            .send_command(&C2SCommand::SendMessage(SendMessage {
                sender_id: UserId(2),
                receiver_id: UserId(2),
                content: "hi".to_string(),
            }))
            .await;

        match alice.next_event().await {
            S2CEvent::Error(e) => assert_eq!(e.message, "Invalid sender ID"),
            other => panic!("unexpected event: {other:?}"),
        }
        bob.expect_silence().await;
        assert!(h.message_service.stored().is_empty());
    }

    #[tokio::test]
    async fn unknown_receiver_is_a_soft_error() {
        let h = harness();
        let mut alice = connect_and_join(&h.dispatcher, UserId(1)).await;

        alice
            .send_command(&C2SCommand::SendMessage(SendMessage {
                sender_id: UserId(1),
                receiver_id: UserId(99),
                content: "hi".to_string(),
            }))
            .await;

        match alice.next_event().await {
            S2CEvent::Error(e) => assert_eq!(e.message, "Sender or receiver not found"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(h.message_service.stored().is_empty());
    }

    #[tokio::test]
    async fn joining_a_foreign_identity_is_rejected() {
        let h = harness();
        let mut alice = connect(&h.dispatcher, UserId(1)).await;

        alice
            .send_command(&C2SCommand::Join(JoinGroup { user_id: UserId(2) }))
            .await;

        match alice.next_event().await {
            S2CEvent::Error(e) => assert_eq!(e.message, "Invalid user ID"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(h.dispatcher.registry().members_of(UserId(2)).is_empty());
    }

    #[tokio::test]
    async fn disconnect_reaps_registrations() {
        let h = harness();
        let alice = connect_and_join(&h.dispatcher, UserId(1)).await;
        assert_eq!(h.dispatcher.registry().connection_count(), 1);

        drop(alice); // closes the client-to-server channel

        wait_until(|| h.dispatcher.registry().members_of(UserId(1)).is_empty()).await;
        wait_until(|| h.dispatcher.registry().connection_count() == 0).await;
    }

    #[tokio::test]
    async fn offline_receiver_still_persists_the_message() {
        let h = harness();

        let record = h
            .dispatcher
            .send_direct_message(
                UserId(1),
                SendMessage {
                    sender_id: UserId(1),
                    receiver_id: UserId(2),
                    content: "catch up later".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(record.receiver_id, UserId(2));
        assert_eq!(h.message_service.stored().len(), 1);
    }

    #[tokio::test]
    async fn publish_with_no_connections_is_ok() {
        let h = harness();
        h.dispatcher
            .publish(&notification_for(UserId(1)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn malformed_command_gets_soft_error() {
        let h = harness();
        let mut alice = connect(&h.dispatcher, UserId(1)).await;

        alice
            .tx
            .send(ConnMessage::Text("{not json".to_string()))
            .await
            .unwrap();

        match alice.next_event().await {
            S2CEvent::Error(e) => assert_eq!(e.message, "malformed message"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
