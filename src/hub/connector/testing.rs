//! 测试用的可编排传输

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::hub::core::status::{Properties, Response, StatusCode};
use crate::hub::core::traits::{Transport, TransportError};

#[derive(Default)]
struct Script {
    reject_handshake: bool,
    session: bool,
    fail_always: Option<TransportError>,
    fail_next: u32,
    fail_next_error: Option<TransportError>,
    data_reply: Option<Response>,
    inbound: VecDeque<Response>,
}

pub struct ScriptedTransport {
    script: Mutex<Script>,
    exchanges: AtomicU32,
    data_counter: AtomicU32,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::default()),
            exchanges: AtomicU32::new(0),
            data_counter: AtomicU32::new(0),
        }
    }

    pub fn reject_handshake(&self) {
        self.script.lock().unwrap().reject_handshake = true;
    }

    pub fn fail_always(&self, error: TransportError) {
        self.script.lock().unwrap().fail_always = Some(error);
    }

    pub fn fail_next(&self, count: u32, error: TransportError) {
        let mut script = self.script.lock().unwrap();
        script.fail_next = count;
        script.fail_next_error = Some(error);
    }

    /// 固定 get_data 的回复
    pub fn reply_to_data(&self, response: Response) {
        self.script.lock().unwrap().data_reply = Some(response);
    }

    pub fn push_inbound(&self, response: Response) {
        self.script.lock().unwrap().inbound.push_back(response);
    }

    pub fn exchange_count(&self) -> u32 {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn handshake(&self) -> Result<Response, TransportError> {
        let mut script = self.script.lock().unwrap();
        if script.reject_handshake {
            return Ok(Response::failed(StatusCode::Unavailable, "handshake refused"));
        }
        script.session = true;
        Ok(Response::success())
    }

    async fn farewell(&self) -> Result<Response, TransportError> {
        let mut script = self.script.lock().unwrap();
        if !script.session {
            return Ok(Response::failed(StatusCode::Unavailable, "no session"));
        }
        script.session = false;
        Ok(Response::success())
    }

    async fn exchange(&self, command: &Properties) -> Result<Response, TransportError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if let Some(error) = &script.fail_always {
            return Err(error.clone());
        }
        if script.fail_next > 0 {
            script.fail_next -= 1;
            if let Some(error) = &script.fail_next_error {
                return Err(error.clone());
            }
        }

        let action = command.get("action").and_then(|v| v.as_str()).unwrap_or_default();
        if action == "get_data" {
            if let Some(reply) = &script.data_reply {
                return Ok(reply.clone());
            }
            let n = self.data_counter.fetch_add(1, Ordering::SeqCst);
            return Ok(Response::success()
                .with("action", action)
                .with("data", json!({ "sample": n })));
        }
        Ok(Response::success().with("action", action))
    }

    async fn poll_inbound(&self) -> Option<Response> {
        self.script.lock().unwrap().inbound.pop_front()
    }

    async fn has_inbound(&self) -> bool {
        !self.script.lock().unwrap().inbound.is_empty()
    }
}
