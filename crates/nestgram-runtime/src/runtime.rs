//! The bot runtime: wires configuration, the dispatcher and an update source.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use nestgram_runtime::NestGram;
//!
//! // Loads nestgram.toml from the current directory plus NESTGRAM_* variables
//! let bot = NestGram::builder().module(app_module()).build()?;
//! bot.run().await?;
//!
//! // Explicit file and profile
//! let bot = NestGram::builder()
//!     .config_file("config/nestgram.toml")
//!     .profile("production")
//!     .module(app_module())
//!     .build()?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ConfigError, ConfigLoader, NestGramConfig, RunType, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::polling::Polling;
use nestgram_core::{Api, BotApi, BotInfo};
use nestgram_framework::{Dispatcher, Module, ScopeStore};
use nestgram_transport::{HttpApi, WebhookHandle, WebhookServer};

/// The running parts of a started bot.
#[derive(Default)]
struct RunState {
    me: Option<BotInfo>,
    cancel: Option<CancellationToken>,
    polling: Option<JoinHandle<()>>,
    webhook: Option<WebhookHandle>,
}

impl RunState {
    fn is_running(&self) -> bool {
        self.me.is_some()
    }
}

/// A configured bot.
///
/// # Simple Usage
///
/// ```rust,ignore
/// let bot = NestGram::builder()
///     .module(Module::new("app").controller(start_controller()))
///     .build()?;
///
/// bot.run().await?;
/// ```
pub struct NestGram {
    /// The validated configuration.
    config: NestGramConfig,
    /// Remote API used by the runtime and every `Answer`.
    api: Api,
    /// HTTP client behind `api`, absent when a custom `BotApi` was supplied.
    http: Option<HttpApi>,
    /// Update dispatcher shared by both update sources.
    dispatcher: Dispatcher,
    state: Mutex<RunState>,
}

impl NestGram {
    /// Creates a runtime builder.
    pub fn builder() -> NestGramBuilder {
        NestGramBuilder::new()
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &NestGramConfig {
        &self.config
    }

    /// The remote API bound to the configured token.
    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Open conversation scopes.
    pub fn scopes(&self) -> &Arc<ScopeStore> {
        self.dispatcher.scopes()
    }

    /// Returns an [`Api`] acting as another bot.
    ///
    /// Shares the HTTP connection pool when the runtime owns one.
    pub fn api_for(&self, token: impl Into<String>) -> RuntimeResult<Api> {
        let http = match &self.http {
            Some(http) => http.with_token(token),
            None => http_api(&self.config, token.into())?,
        };
        Ok(Api::new(http))
    }

    /// Returns whether the bot is currently running.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }

    /// The bot account, known once started.
    pub async fn me(&self) -> Option<BotInfo> {
        self.state.lock().await.me.clone()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts receiving updates and returns the bot's username.
    ///
    /// In polling mode any registered webhook is removed first. In webhook
    /// mode the listener is bound before the webhook is registered, so the
    /// platform never pushes to a closed port.
    pub async fn start(&self) -> RuntimeResult<String> {
        let mut state = self.state.lock().await;
        if let Some(me) = &state.me {
            warn!("Bot is already running");
            return Ok(username(me));
        }

        info!(run_type = ?self.config.run_type, "Starting bot");
        let me = self.api.get_me().await?;

        match self.config.run_type {
            RunType::Polling => {
                self.api
                    .delete_webhook(self.config.polling.drop_pending_updates)
                    .await?;

                let cancel = CancellationToken::new();
                let polling = Polling::new(
                    self.api.clone(),
                    Arc::new(self.dispatcher.clone()),
                    self.config.polling.clone(),
                );
                state.polling = Some(tokio::spawn(polling.run(cancel.child_token())));
                state.cancel = Some(cancel);
            }
            RunType::Webhook => {
                let options = self
                    .config
                    .webhook
                    .to_options()
                    .ok_or_else(|| ConfigError::missing_field("webhook.url"))?;

                let handle = WebhookServer::new()
                    .secret_token(self.config.webhook.secret_token.clone())
                    .listen(&self.config.webhook_addr(), Arc::new(self.dispatcher.clone()))
                    .await?;
                self.api.set_webhook(&options).await?;

                info!(addr = %handle.local_addr(), url = %options.url, "Webhook registered");
                state.webhook = Some(handle);
            }
        }

        let name = username(&me);
        state.me = Some(me);
        info!(username = %name, "Bot started");

        Ok(name)
    }

    /// Stops the update source.
    ///
    /// A batch that is being dispatched finishes first; in-flight webhook
    /// requests are drained.
    pub async fn stop(&self) -> RuntimeResult<()> {
        let mut state = self.state.lock().await;
        if !state.is_running() {
            warn!("Bot is not running");
            return Ok(());
        }

        info!("Stopping bot");

        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = state.polling.take()
            && let Err(e) = task.await
        {
            error!(error = %e, "Polling task failed");
        }
        if let Some(handle) = state.webhook.take() {
            handle.shutdown().await;
        }
        state.me = None;

        info!("Bot stopped");

        Ok(())
    }

    /// Runs the bot until a shutdown signal is received.
    pub async fn run(&self) -> RuntimeResult<()> {
        let name = self.start().await?;

        info!(username = %name, "Bot is now running. Press Ctrl+C to stop.");

        wait_for_shutdown().await;

        self.stop().await
    }

    /// Runs the bot until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;

        shutdown.await;

        self.stop().await
    }
}

fn username(me: &BotInfo) -> String {
    me.username.clone().unwrap_or_else(|| me.first_name.clone())
}

fn http_api(config: &NestGramConfig, token: String) -> RuntimeResult<HttpApi> {
    Ok(HttpApi::with_config(
        token,
        config.api.base_url.clone(),
        Duration::from_secs(config.api.timeout_secs),
    )?)
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// NestGramBuilder
// =============================================================================

/// Builder for a [`NestGram`] runtime.
///
/// # Example
///
/// ```rust,ignore
/// let bot = NestGram::builder()
///     .config_file("config/nestgram.toml")
///     .profile("production")
///     .module(app_module())
///     .build()?;
/// ```
pub struct NestGramBuilder {
    config_loader: ConfigLoader,
    config: Option<NestGramConfig>,
    modules: Vec<Module>,
    api: Option<Api>,
}

impl NestGramBuilder {
    /// Creates a builder searching the current and user config directories.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new()
                .with_current_dir()
                .with_user_config_dir(),
            config: None,
            modules: Vec::new(),
            api: None,
        }
    }

    /// Uses `config` as is, skipping files and environment variables.
    pub fn config(mut self, config: NestGramConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Sets the bot token, overriding files and environment.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.set("token", token.into());
        self
    }

    /// Adds a module. Modules are registered in the order added.
    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    /// Adds several modules at once.
    pub fn modules(mut self, modules: impl IntoIterator<Item = Module>) -> Self {
        self.modules.extend(modules);
        self
    }

    /// Talks to the platform through `api` instead of the HTTP client.
    pub fn api(mut self, api: impl BotApi + 'static) -> Self {
        self.api = Some(Api::new(api));
        self
    }

    /// Loads and validates the configuration, initializes logging and builds
    /// the handler registry.
    pub fn build(self) -> RuntimeResult<NestGram> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;
        logging::init_from_config(&config);

        let (api, http) = match self.api {
            Some(api) => (api, None),
            None => {
                let http = http_api(&config, config.token.clone())?;
                (Api::new(http.clone()), Some(http))
            }
        };

        let registry = self
            .modules
            .into_iter()
            .fold(Module::new("root"), Module::import)
            .build()?;
        let dispatcher = Dispatcher::new(registry, api.clone(), Arc::new(ScopeStore::new()))?;

        info!(
            run_type = ?config.run_type,
            handlers = dispatcher.handler_count(),
            scopes = dispatcher.scopes().scope_count(),
            log_level = %config.log.level,
            "Runtime initialized from configuration"
        );

        Ok(NestGram {
            config,
            api,
            http,
            dispatcher,
            state: Mutex::new(RunState::default()),
        })
    }
}

impl Default for NestGramBuilder {
    fn default() -> Self {
        Self::new()
    }
}
