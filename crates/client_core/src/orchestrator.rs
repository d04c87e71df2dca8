//! Mutating operator actions and how their outcomes reach the view.

use shared::{
    domain::EntryId,
    protocol::{ActionPayload, EntryActionResponse, JoinResponse, PauseStateResponse},
};
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, ClientResult, RequestError},
    name_rules::validate_user_name,
    state::{AppEvent, AppState},
    transport::{ApiResponse, ResponseMeta, UNKNOWN_META},
    types::{ActionKind, ActionOutcome, ActionResult, SelectionToken, Toast},
    QueueClient,
};

impl QueueClient {
    /// Adds `user_name` to the selected queue, or asks the engine whether it
    /// could when `simulate` is set.
    pub async fn join(
        &self,
        user_name: &str,
        simulate: bool,
    ) -> ClientResult<ActionOutcome<JoinResponse>> {
        let name = validate_user_name(user_name).map_err(ClientError::InvalidName)?;
        let token = self.begin_action(|_| Ok(ActionKind::Join)).await?;
        let outcome = self.run_join(token, name, simulate).await;
        self.finish_action(token).await;
        outcome
    }

    pub async fn serve_next(
        &self,
        simulate: bool,
    ) -> ClientResult<ActionOutcome<EntryActionResponse>> {
        self.next_entry_action(ActionKind::ServeNext, simulate).await
    }

    pub async fn skip_next(
        &self,
        simulate: bool,
    ) -> ClientResult<ActionOutcome<EntryActionResponse>> {
        self.next_entry_action(ActionKind::SkipNext, simulate).await
    }

    /// Skips one specific entry regardless of its place in line.
    pub async fn skip_entry(
        &self,
        entry_id: EntryId,
    ) -> ClientResult<ApiResponse<EntryActionResponse>> {
        let token = self.begin_action(|_| Ok(ActionKind::SkipEntry)).await?;
        let outcome = self.run_skip_entry(token, entry_id).await;
        self.finish_action(token).await;
        outcome
    }

    /// Pauses an active queue or resumes a paused one, based on the last
    /// known pause state.
    pub async fn toggle_pause(&self) -> ClientResult<ApiResponse<PauseStateResponse>> {
        let mut kind = ActionKind::Pause;
        let token = self
            .begin_action(|state| {
                kind = if state.is_paused {
                    ActionKind::Resume
                } else {
                    ActionKind::Pause
                };
                Ok(kind)
            })
            .await?;
        let outcome = self.run_toggle_pause(token, kind).await;
        self.finish_action(token).await;
        outcome
    }

    async fn next_entry_action(
        &self,
        kind: ActionKind,
        simulate: bool,
    ) -> ClientResult<ActionOutcome<EntryActionResponse>> {
        let token = self
            .begin_action(|state| {
                if state.waiting_count() == Some(0) {
                    Err(ClientError::NothingWaiting)
                } else {
                    Ok(kind)
                }
            })
            .await?;
        let outcome = self.run_next_entry(token, kind, simulate).await;
        self.finish_action(token).await;
        outcome
    }

    /// Marks an action as in flight. `pick` sees the state under the same
    /// lock and names the action, or refuses it.
    async fn begin_action(
        &self,
        pick: impl FnOnce(&AppState) -> ClientResult<ActionKind>,
    ) -> ClientResult<SelectionToken> {
        let mut state = self.state.lock().await;
        let token = state.token().ok_or(ClientError::NoQueueSelected)?;
        if let Some(running) = state.action_in_flight {
            return Err(ClientError::ActionInFlight(running));
        }
        let kind = pick(&state)?;
        state.apply(AppEvent::ActionStarted(kind));
        info!(queue_id = token.queue_id.0, action = %kind, "action started");
        Ok(token)
    }

    async fn finish_action(&self, token: SelectionToken) {
        self.state
            .lock()
            .await
            .apply(AppEvent::ActionFinished(token));
    }

    /// Writes the toast and panel for an action that ran under `token`.
    ///
    /// Nothing is written once the operator has moved to another selection.
    /// The state lock is held across the writes so a selection change either
    /// happens before the check or clears the panel afterwards.
    async fn feedback(
        &self,
        token: SelectionToken,
        toast: Option<Toast>,
        panel: Option<ActionResult>,
    ) {
        let state = self.state.lock().await;
        if state.token() != Some(token) {
            debug!(
                queue_id = token.queue_id.0,
                "selection changed while the action ran, dropping its feedback"
            );
            return;
        }
        if let Some(toast) = toast {
            self.notifier.show(toast.message, toast.kind).await;
        }
        self.notifier.set_action_result(panel).await;
        drop(state);
    }

    async fn run_join(
        &self,
        token: SelectionToken,
        name: &str,
        simulate: bool,
    ) -> ClientResult<ActionOutcome<JoinResponse>> {
        let response = match self.api.join(token.queue_id, name, simulate).await {
            Ok(response) => response,
            Err(err) => return Err(self.report_failure(token, ActionKind::Join, err).await),
        };
        let outcome = self
            .classify(token, ActionKind::Join, simulate, response)
            .await?;

        match &outcome {
            ActionOutcome::Simulated { simulation, meta } => {
                let message = if simulation.would_succeed() {
                    format!("Join would succeed for \"{name}\"")
                } else {
                    format!("Join would fail for \"{name}\"")
                };
                let panel =
                    ActionResult::from_simulation(message, simulation, meta.request_id.clone());
                self.feedback(token, None, Some(panel)).await;
            }
            ActionOutcome::Live { data, meta } => {
                info!(
                    queue_id = token.queue_id.0,
                    entry_id = data.entry_id.0,
                    position = data.position,
                    request_id = %meta.request_id,
                    "joined queue"
                );
                self.apply(AppEvent::PreviewExpired(token)).await;
                self.refresh_status_for(token).await;
                let toast = Toast::success(format!("{} joined the queue!", data.user_name));
                self.feedback(token, Some(toast), None).await;
            }
        }
        Ok(outcome)
    }

    async fn run_next_entry(
        &self,
        token: SelectionToken,
        kind: ActionKind,
        simulate: bool,
    ) -> ClientResult<ActionOutcome<EntryActionResponse>> {
        let serving = kind == ActionKind::ServeNext;
        let result = if serving {
            self.api.serve_next(token.queue_id, simulate).await
        } else {
            self.api.skip_next(token.queue_id, simulate).await
        };
        let response = match result {
            Ok(response) => response,
            Err(err) => return Err(self.report_failure(token, kind, err).await),
        };
        let outcome = self.classify(token, kind, simulate, response).await?;
        let verb = if serving { "Serve" } else { "Skip" };

        match &outcome {
            ActionOutcome::Simulated { simulation, meta } => {
                let message = match (simulation.would_succeed(), &simulation.user_name) {
                    (true, Some(name)) => format!("{verb} would succeed: \"{name}\""),
                    (true, None) => format!("{verb} would succeed"),
                    (false, _) => format!("{verb} would fail"),
                };
                let panel =
                    ActionResult::from_simulation(message, simulation, meta.request_id.clone());
                self.feedback(token, None, Some(panel)).await;
            }
            ActionOutcome::Live { data, meta } => {
                info!(
                    queue_id = token.queue_id.0,
                    entry_id = data.entry_id.0,
                    action = %kind,
                    request_id = %meta.request_id,
                    "entry moved out of line"
                );
                self.apply(AppEvent::PreviewExpired(token)).await;
                tokio::join!(
                    self.refresh_status_for(token),
                    self.refresh_summary_for(token)
                );
                let (toast, panel) = if serving {
                    (
                        format!("{} has been served!", data.user_name),
                        format!("Served: {}", data.user_name),
                    )
                } else {
                    (
                        format!("{} has been skipped.", data.user_name),
                        format!("Skipped: {}", data.user_name),
                    )
                };
                self.feedback(
                    token,
                    Some(Toast::success(toast)),
                    Some(ActionResult::success(panel, meta.request_id.clone())),
                )
                .await;
            }
        }
        Ok(outcome)
    }

    async fn run_skip_entry(
        &self,
        token: SelectionToken,
        entry_id: EntryId,
    ) -> ClientResult<ApiResponse<EntryActionResponse>> {
        let response = match self.api.skip_entry(token.queue_id, entry_id).await {
            Ok(response) => response,
            Err(err) => {
                return Err(self
                    .report_failure(token, ActionKind::SkipEntry, err)
                    .await)
            }
        };
        self.apply(AppEvent::RequestTraced {
            token,
            meta: response.meta.clone(),
        })
        .await;
        info!(
            queue_id = token.queue_id.0,
            entry_id = entry_id.0,
            request_id = %response.meta.request_id,
            "entry skipped"
        );

        self.apply(AppEvent::PreviewExpired(token)).await;
        self.refresh_status_for(token).await;
        let name = &response.data.user_name;
        self.feedback(
            token,
            Some(Toast::success(format!("{name} has been skipped."))),
            Some(ActionResult::success(
                format!("Skipped: {name}"),
                response.meta.request_id.clone(),
            )),
        )
        .await;
        Ok(response)
    }

    async fn run_toggle_pause(
        &self,
        token: SelectionToken,
        kind: ActionKind,
    ) -> ClientResult<ApiResponse<PauseStateResponse>> {
        let result = if kind == ActionKind::Resume {
            self.api.resume(token.queue_id).await
        } else {
            self.api.pause(token.queue_id).await
        };
        let response = match result {
            Ok(response) => response,
            Err(err) => return Err(self.report_failure(token, kind, err).await),
        };
        self.apply(AppEvent::RequestTraced {
            token,
            meta: response.meta.clone(),
        })
        .await;

        let paused = response.data.status.is_paused();
        self.apply(AppEvent::PauseChanged { token, paused }).await;
        info!(
            queue_id = token.queue_id.0,
            paused,
            request_id = %response.meta.request_id,
            "queue pause state changed"
        );

        let (toast, panel) = if paused {
            ("Queue paused; joins blocked", "Queue paused")
        } else {
            ("Queue resumed; accepting joins", "Queue resumed")
        };
        self.feedback(
            token,
            Some(Toast::success(toast)),
            Some(ActionResult::success(
                panel,
                response.meta.request_id.clone(),
            )),
        )
        .await;
        Ok(response)
    }

    /// Records the response trace and turns the payload into an outcome.
    ///
    /// A simulation request answered with a live-looking payload is refused:
    /// the engine ignored the flag and the view must not claim nothing
    /// changed, nor that it did.
    async fn classify<T>(
        &self,
        token: SelectionToken,
        kind: ActionKind,
        simulate: bool,
        response: ApiResponse<ActionPayload<T>>,
    ) -> ClientResult<ActionOutcome<T>> {
        let meta = response.meta;
        self.apply(AppEvent::RequestTraced {
            token,
            meta: meta.clone(),
        })
        .await;
        match response.data {
            ActionPayload::Simulated(simulation) => {
                info!(
                    action = %kind,
                    verdict = ?simulation.result,
                    request_id = %meta.request_id,
                    "dry run answered"
                );
                Ok(ActionOutcome::Simulated { simulation, meta })
            }
            ActionPayload::Live(_) if simulate => {
                let err = RequestError::Decode(format!(
                    "expected a dry-run answer for {kind}, got a live result"
                ));
                Err(self
                    .report_failure_with(token, kind, err, Some(&meta))
                    .await)
            }
            ActionPayload::Live(data) => Ok(ActionOutcome::Live { data, meta }),
        }
    }

    async fn report_failure(
        &self,
        token: SelectionToken,
        kind: ActionKind,
        err: RequestError,
    ) -> ClientError {
        self.report_failure_with(token, kind, err, None).await
    }

    /// Surfaces a failed action as an error toast plus a blocked panel entry.
    /// The error is returned to the caller even when the view has moved on.
    async fn report_failure_with(
        &self,
        token: SelectionToken,
        kind: ActionKind,
        err: RequestError,
        meta: Option<&ResponseMeta>,
    ) -> ClientError {
        let request_id = match err.request_id().or(meta.map(|meta| meta.request_id.as_str())) {
            Some(id) => id.to_string(),
            None => self
                .state
                .lock()
                .await
                .last_request_id
                .clone()
                .unwrap_or_else(|| UNKNOWN_META.to_string()),
        };
        warn!(
            queue_id = token.queue_id.0,
            action = %kind,
            category = ?err.category(),
            rule_code = err.rule_code().unwrap_or("-"),
            request_id = %request_id,
            error = %err,
            "action failed"
        );

        let message = err.to_string();
        self.feedback(
            token,
            Some(Toast::error(message.clone())),
            Some(ActionResult::blocked(
                message,
                err.rule_code().map(str::to_string),
                None,
                request_id,
            )),
        )
        .await;
        ClientError::Request(err)
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
