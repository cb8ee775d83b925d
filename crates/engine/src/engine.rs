//! Runs one batch: resolve ids → update-check → per-component execution in
//! caller order → (ping flush is the caller's responsibility, since
//! `UpdateClient` owns the `PingManager` handoff across batches).

use std::collections::HashMap;

use ceu_errors::ErrorCategory;
use ceu_types::{ComponentState, CrxUpdateItem};

use crate::component::Component;
use crate::context::UpdateContext;
use crate::traits::{CheckComponentInfo, DataSource};

/// Batch completion code surfaced to the façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCode {
    None,
    UpdateCheckError,
    CrxNotFound,
}

/// `data_cb` returned a vector whose length did not match the id list.
#[derive(Debug, Clone, Copy)]
pub struct BadDataCallback;

pub struct BatchOutcome {
    pub completion: CompletionCode,
    pub retry_after_sec: u32,
}

pub struct UpdateEngine;

impl UpdateEngine {
    /// Drives one batch to completion: resolve, check, then run every
    /// `CAN_UPDATE` component to a terminal state in the caller's id order.
    pub async fn run(
        context: &mut UpdateContext,
        data_source: &dyn DataSource,
        emit: &mut (dyn FnMut(&CrxUpdateItem) + Send),
    ) -> Result<BatchOutcome, BadDataCallback> {
        let resolved = data_source.resolve(&context.ids).await;
        if resolved.len() != context.ids.len() {
            return Err(BadDataCallback);
        }

        let collaborators = context.collaborators.clone();
        let eventtype = context.operation.event_type();
        let check_only = context.operation.check_only();
        let is_foreground = context.is_foreground;
        let session_id = context.session_id;

        let UpdateContext {
            ids,
            components,
            cache,
            cache_root,
            work_dir,
            cancel,
            ..
        } = context;

        let mut checkable: Vec<String> = Vec::new();

        for (id, crx) in ids.iter().cloned().zip(resolved) {
            let component = match crx {
                Some(crx) => {
                    checkable.push(id.clone());
                    Component::new(id.clone(), Some(crx))
                }
                None => Component::not_found(id.clone(), eventtype, emit),
            };
            components.insert(id, component);
        }

        if checkable.is_empty() {
            return Ok(BatchOutcome {
                completion: CompletionCode::CrxNotFound,
                retry_after_sec: 0,
            });
        }

        let check_infos: Vec<CheckComponentInfo> = checkable
            .iter()
            .map(|id| {
                let crx = components[id].crx.as_ref().expect("checkable ids have a crx");
                CheckComponentInfo {
                    app_id: crx.app_id.clone(),
                    version: crx.version.clone(),
                    fingerprint: crx.fingerprint.clone(),
                    updates_enabled: crx.updates_enabled,
                    is_foreground,
                    brand: None,
                    ap: None,
                    lang: None,
                }
            })
            .collect();

        let check_outcome = collaborators.checker.check(&check_infos, &HashMap::new()).await;
        let retry_after_sec = check_outcome.retry_after_sec;
        let mut completion = CompletionCode::None;

        match check_outcome.results {
            None => {
                completion = CompletionCode::UpdateCheckError;
                for id in &checkable {
                    components.get_mut(id).expect("just inserted").fail_checking(
                        ErrorCategory::UpdateCheck,
                        check_outcome.error_code,
                        eventtype,
                        emit,
                    );
                }
            }
            Some(results) => {
                for id in &checkable {
                    let app_id = components[id].crx.as_ref().expect("checkable ids have a crx").app_id.clone();
                    let found = results.iter().find(|r| r.extension_id == app_id).cloned();
                    components
                        .get_mut(id)
                        .expect("just inserted")
                        .apply_check_result(found, eventtype, emit);
                }
            }
        }

        for id in ids.iter() {
            if let Some(component) = components.get_mut(id) {
                if component.item.state == ComponentState::CanUpdate {
                    component
                        .run(
                            &collaborators,
                            cache,
                            cache_root,
                            work_dir,
                            session_id,
                            cancel,
                            eventtype,
                            check_only,
                            emit,
                        )
                        .await;
                }
            }
        }

        Ok(BatchOutcome {
            completion,
            retry_after_sec,
        })
    }
}
