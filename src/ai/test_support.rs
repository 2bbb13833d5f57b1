//! Scripted host and SDK doubles shared by the gate, service and action tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use super::errors::{HostError, SdkError};
use super::host::{ChatSdk, SdkHost};
use super::types::ApiOptions;

/// One scripted SDK outcome.
#[derive(Clone)]
pub enum Scripted {
    Reply(Value),
    Fail(SdkError),
}

/// SDK that replays scripted outcomes, repeating the last one.
pub struct MockSdk {
    script: Mutex<VecDeque<Scripted>>,
    pub calls: AtomicUsize,
    pub last_options: Mutex<Option<ApiOptions>>,
}

impl MockSdk {
    pub fn replying(reply: Value) -> Arc<Self> {
        Self::scripted(vec![Scripted::Reply(reply)])
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::scripted(vec![Scripted::Fail(SdkError::Rejected {
            message: message.to_string(),
        })])
    }

    pub fn scripted(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        })
    }
}

impl ChatSdk for MockSdk {
    fn chat<'a>(
        &'a self,
        _prompt: &'a str,
        options: &'a ApiOptions,
    ) -> BoxFuture<'a, Result<Value, SdkError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_options.lock().unwrap() = Some(options.clone());
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            match next {
                Some(Scripted::Reply(v)) => Ok(v),
                Some(Scripted::Fail(e)) => Err(e),
                None => Ok(Value::Null),
            }
        }
        .boxed()
    }
}

/// Host whose SDK appears a fixed number of probes after the loader finishes.
pub struct MockHost {
    pub supported: bool,
    /// Number of loader injections that fail before one succeeds.
    pub failed_loads: usize,
    /// Loader completes but the SDK never shows up.
    pub never_appears: bool,
    /// Number of post-load `sdk()` probes before the SDK becomes visible.
    pub appear_after_probes: usize,
    pub load_delay: Duration,
    pub preinstalled_loader: bool,
    pub sdk_handle: Arc<MockSdk>,

    pub injections: AtomicUsize,
    pub post_load_probes: AtomicUsize,
    pub loaded: AtomicBool,
    /// Simulates the SDK global disappearing (hot reload).
    pub vanished: AtomicBool,
}

impl MockHost {
    pub fn new(sdk: Arc<MockSdk>) -> Self {
        Self {
            supported: true,
            failed_loads: 0,
            never_appears: false,
            appear_after_probes: 1,
            load_delay: Duration::from_millis(5),
            preinstalled_loader: false,
            sdk_handle: sdk,
            injections: AtomicUsize::new(0),
            post_load_probes: AtomicUsize::new(0),
            loaded: AtomicBool::new(false),
            vanished: AtomicBool::new(false),
        }
    }

    /// Host with an SDK that is present from the start.
    pub fn ready(sdk: Arc<MockSdk>) -> Self {
        Self {
            appear_after_probes: 0,
            ..Self::new(sdk)
        }
        .with_existing_loader()
    }

    /// The loader is already on the page and finished loading.
    pub fn with_existing_loader(mut self) -> Self {
        self.preinstalled_loader = true;
        self.loaded.store(true, Ordering::SeqCst);
        self
    }

    /// Host where the SDK can never load.
    pub fn unreachable() -> Self {
        Self {
            never_appears: true,
            ..Self::new(MockSdk::replying(Value::Null))
        }
    }

    pub fn injections(&self) -> usize {
        self.injections.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.post_load_probes.load(Ordering::SeqCst)
    }
}

impl SdkHost for MockHost {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn has_loader(&self, _url: &str) -> bool {
        self.preinstalled_loader || self.loaded.load(Ordering::SeqCst)
    }

    fn inject_loader<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<(), HostError>> {
        async move {
            let attempt = self.injections.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.load_delay).await;
            if attempt <= self.failed_loads {
                return Err(HostError::LoadFailed {
                    url: url.to_string(),
                    reason: "script error".into(),
                });
            }
            self.loaded.store(true, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    }

    fn sdk(&self) -> Option<Arc<dyn ChatSdk>> {
        if !self.loaded.load(Ordering::SeqCst)
            || self.never_appears
            || self.vanished.load(Ordering::SeqCst)
        {
            return None;
        }
        let probe = self.post_load_probes.fetch_add(1, Ordering::SeqCst) + 1;
        if probe >= self.appear_after_probes {
            Some(Arc::clone(&self.sdk_handle) as Arc<dyn ChatSdk>)
        } else {
            None
        }
    }
}
