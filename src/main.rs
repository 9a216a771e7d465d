//! Wiring & DI. Entry point: bootstrap adapters, inject into services, serve HTTP.
//! No business logic here.
//!
//! `ad-report-scheduler run-once` processes due schedules once and exits.

use ad_report_scheduler::adapters::ads::{
    google, meta, GoogleAdsAdapter, GoogleAdsSettings, MetaAdsAdapter, MetaAdsSettings,
};
use ad_report_scheduler::adapters::ai::AnalysisClient;
use ad_report_scheduler::adapters::chat::chatwork::{ChatworkAdapter, DEFAULT_CHATWORK_URL};
use ad_report_scheduler::adapters::http::{router, AppState};
use ad_report_scheduler::adapters::persistence::SqliteRepo;
use ad_report_scheduler::ports::{
    AccountRepo, AdsGateway, AiPort, ChatDeliveryPort, ReportRepo, ScheduleRepo,
};
use ad_report_scheduler::shared::config::AppConfig;
use ad_report_scheduler::usecases::{
    AdsProviders, AnalysisService, ReportService, ScheduleService, Ticker,
};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load().map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let run_once = std::env::args().nth(1).as_deref() == Some("run-once");

    let data_path = cfg.data_dir_or_default();
    let sqlite_repo = Arc::new(
        SqliteRepo::connect(&data_path)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite: {}", e))?,
    );
    info!(path = %sqlite_repo.path().display(), "report database ready");
    let account_repo = Arc::clone(&sqlite_repo) as Arc<dyn AccountRepo>;
    let schedule_repo = Arc::clone(&sqlite_repo) as Arc<dyn ScheduleRepo>;
    let report_repo = Arc::clone(&sqlite_repo) as Arc<dyn ReportRepo>;

    // --- Outbound HTTP: one pooled client for provider and chat APIs ---
    let http = reqwest::Client::builder()
        .timeout(cfg.http_timeout_or_default())
        .build()?;

    let meta_adapter: Arc<dyn AdsGateway> = Arc::new(MetaAdsAdapter::new(
        http.clone(),
        MetaAdsSettings {
            base_url: cfg
                .meta_api_url
                .clone()
                .unwrap_or_else(|| meta::DEFAULT_GRAPH_URL.to_string()),
            app_id: cfg.meta_app_id(),
            app_secret: cfg.meta_app_secret(),
        },
    ));
    let google_adapter: Arc<dyn AdsGateway> = Arc::new(GoogleAdsAdapter::new(
        http.clone(),
        GoogleAdsSettings {
            base_url: cfg
                .google_ads_api_url
                .clone()
                .unwrap_or_else(|| google::DEFAULT_ADS_URL.to_string()),
            token_url: cfg
                .google_token_url
                .clone()
                .unwrap_or_else(|| google::DEFAULT_TOKEN_URL.to_string()),
            client_id: cfg.google_client_id(),
            client_secret: cfg.google_client_secret(),
            developer_token: cfg.google_developer_token(),
        },
    ));
    let providers = AdsProviders::new(vec![meta_adapter, google_adapter]);

    let chat: Arc<dyn ChatDeliveryPort> = Arc::new(ChatworkAdapter::new(
        http,
        cfg.chatwork_api_url.as_deref().unwrap_or(DEFAULT_CHATWORK_URL),
    ));

    // --- Analysis: external service when configured, rule-based otherwise ---
    let analysis_timeout = cfg.analysis_timeout_or_default();
    let primary: Option<Arc<dyn AiPort>> = match cfg.analysis_api_url() {
        Some(url) => {
            info!(url = %url, timeout_secs = analysis_timeout.as_secs(), "using analysis service");
            Some(Arc::new(AnalysisClient::new(&url, analysis_timeout)?))
        }
        None => {
            info!("ANALYSIS_API_URL not set; using rule-based analysis only");
            None
        }
    };
    let analysis = Arc::new(AnalysisService::new(primary, analysis_timeout));

    let schedule_offset = cfg.schedule_offset_or_default();
    let report_service = Arc::new(ReportService::new(
        account_repo.clone(),
        schedule_repo.clone(),
        report_repo,
        providers,
        analysis,
        chat,
        schedule_offset,
    ));
    let schedule_service = Arc::new(ScheduleService::new(
        account_repo,
        schedule_repo,
        schedule_offset,
    ));

    if run_once {
        let ticker = Ticker::new(Arc::clone(&report_service), std::time::Duration::ZERO);
        ticker.tick().await;
        return Ok(());
    }

    if let Some(interval) = cfg.scheduler_interval() {
        let ticker = Ticker::new(Arc::clone(&report_service), interval);
        tokio::spawn(async move { ticker.run_loop().await });
    } else {
        info!("in-process scheduler disabled; expecting external trigger");
    }

    let internal_api_key = cfg.internal_api_key();
    if internal_api_key.is_none() {
        warn!("INTERNAL_API_KEY not set; batch trigger will reject every call");
    }
    let jwt_secret = cfg.jwt_secret();
    if jwt_secret.is_none() {
        warn!("JWT_SECRET not set; session routes will reject every call");
    }

    let app = router(AppState {
        reports: report_service,
        schedules: schedule_service,
        jwt_secret,
        internal_api_key,
    });

    let addr = cfg.bind_addr_or_default();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
    info!(addr = %addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
