//! REST routes over the ledger handle
//!
//! Every handler forwards to the ledger service and maps `LedgerError` onto
//! an HTTP status with a `{"error": code, "message": text}` body.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenor_common::{AccountId, LedgerError, MarketId, Maturity, PoolState, Receipt};
use tenor_ledger::{
    AccountLiquidity, AccountSnapshot, CurveParameters, LedgerHandle, MaturityPool,
    ParametersVersion, Role, SmartPool, StaticPriceOracle,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::SERVER_VERSION;

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerHandle,
    pub oracle: Arc<StaticPriceOracle>,
}

/// Ledger failure rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            LedgerError::MarketNotListed(_) => StatusCode::NOT_FOUND,
            LedgerError::AccessControlDenied(_) => StatusCode::FORBIDDEN,
            LedgerError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::InvalidPoolId(_)
            | LedgerError::InvalidAmount
            | LedgerError::InvalidParameters(_)
            | LedgerError::InvalidSetBorrowCap(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AmountQuery {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub maturity: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SmartPoolRequest {
    pub account: AccountId,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub account: AccountId,
    pub amount: Decimal,
    #[serde(default)]
    pub min_amount_out: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct BorrowRequest {
    pub account: AccountId,
    pub amount: Decimal,
    pub max_amount_out: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct RepayRequest {
    /// Defaults to the borrower
    pub payer: Option<AccountId>,
    pub account: AccountId,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub account: AccountId,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct LiquidateRequest {
    pub liquidator: AccountId,
    pub borrower: AccountId,
    pub debt_market: MarketId,
    pub maturity: u64,
    pub repay_amount: Decimal,
    pub collateral_market: MarketId,
}

#[derive(Debug, Deserialize)]
pub struct EnterMarketsRequest {
    pub markets: Vec<MarketId>,
}

#[derive(Debug, Deserialize)]
pub struct ParametersRequest {
    pub caller: AccountId,
    pub params: CurveParameters,
}

#[derive(Debug, Deserialize)]
pub struct ValueRequest {
    pub caller: AccountId,
    pub value: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct BorrowCap {
    pub market: MarketId,
    pub cap: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct BorrowCapsRequest {
    pub caller: AccountId,
    pub caps: Vec<BorrowCap>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub caller: AccountId,
    pub account: AccountId,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct PriceRequest {
    pub caller: AccountId,
    pub market: MarketId,
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct MarketSummary {
    pub id: MarketId,
    pub smart_pool: SmartPool,
    pub borrow_cap: Decimal,
    pub collateral_factor: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PoolView {
    pub maturity: Maturity,
    pub state: PoolState,
    pub pool: MaturityPool,
}

#[derive(Debug, Serialize)]
pub struct RateQuote {
    pub maturity: Maturity,
    pub amount: Decimal,
    pub rate: Decimal,
}

#[derive(Debug, Serialize)]
pub struct YieldQuote {
    pub maturity: Maturity,
    pub amount: Decimal,
    pub earned: Decimal,
    pub smart_pool_fee: Decimal,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/version", get(version))
        // Markets
        .route("/api/v1/markets", get(list_markets))
        .route("/api/v1/markets/:market/smart-pool", get(get_smart_pool))
        .route("/api/v1/markets/:market/smart-pool/deposit", post(deposit_to_smart_pool))
        .route("/api/v1/markets/:market/smart-pool/withdraw", post(withdraw_from_smart_pool))
        // Maturity pools
        .route("/api/v1/markets/:market/pools/:maturity", get(get_pool))
        .route("/api/v1/markets/:market/pools/:maturity/rate", get(quote_rate))
        .route("/api/v1/markets/:market/pools/:maturity/yield", get(quote_yield))
        .route("/api/v1/markets/:market/pools/:maturity/deposit", post(deposit_to_maturity_pool))
        .route("/api/v1/markets/:market/pools/:maturity/borrow", post(borrow_from_maturity_pool))
        .route("/api/v1/markets/:market/pools/:maturity/repay", post(repay_to_maturity_pool))
        .route("/api/v1/markets/:market/pools/:maturity/withdraw", post(withdraw_from_maturity_pool))
        // Accounts
        .route("/api/v1/markets/:market/accounts/:account", get(account_snapshot))
        .route("/api/v1/accounts/:account/liquidity", get(account_liquidity))
        .route("/api/v1/accounts/:account/markets", post(enter_markets))
        .route("/api/v1/accounts/:account/markets/:market", delete(exit_market))
        .route("/api/v1/liquidations", post(liquidate))
        // Administration
        .route("/api/v1/admin/markets/:market/parameters", post(set_parameters))
        .route("/api/v1/admin/markets/:market/penalty-rate", post(set_penalty_rate))
        .route("/api/v1/admin/markets/:market/smart-pool-fee-rate", post(set_smart_pool_fee_rate))
        .route(
            "/api/v1/admin/markets/:market/distribution-weighter",
            post(set_distribution_weighter),
        )
        .route("/api/v1/admin/liquidation-fee", post(set_liquidation_fee))
        .route("/api/v1/admin/borrow-caps", post(set_market_borrow_caps))
        .route("/api/v1/admin/roles", post(grant_role))
        .route("/api/v1/admin/roles/revoke", post(revoke_role))
        .route("/api/v1/admin/prices", post(set_price))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "tenor-server",
        "version": SERVER_VERSION,
        "description": "Fixed-rate, fixed-term lending ledger",
    }))
}

async fn list_markets(State(state): State<AppState>) -> ApiResult<Vec<MarketSummary>> {
    let markets = state
        .ledger
        .call(|engine| {
            engine
                .state()
                .markets
                .values()
                .map(|m| MarketSummary {
                    id: m.id.clone(),
                    smart_pool: m.smart_pool.clone(),
                    borrow_cap: m.borrow_cap,
                    collateral_factor: m.collateral_factor,
                })
                .collect::<Vec<_>>()
        })
        .await?;
    Ok(Json(markets))
}

async fn get_smart_pool(
    State(state): State<AppState>,
    Path(market): Path<MarketId>,
) -> ApiResult<SmartPool> {
    let pool = state
        .ledger
        .call(move |engine| engine.smart_pool(&market))
        .await??;
    Ok(Json(pool))
}

async fn deposit_to_smart_pool(
    State(state): State<AppState>,
    Path(market): Path<MarketId>,
    Json(req): Json<SmartPoolRequest>,
) -> ApiResult<Receipt> {
    let receipt = state
        .ledger
        .deposit_to_smart_pool(market, req.account, req.amount)
        .await?;
    Ok(Json(receipt))
}

async fn withdraw_from_smart_pool(
    State(state): State<AppState>,
    Path(market): Path<MarketId>,
    Json(req): Json<SmartPoolRequest>,
) -> ApiResult<Receipt> {
    let receipt = state
        .ledger
        .withdraw_from_smart_pool(market, req.account, req.amount)
        .await?;
    Ok(Json(receipt))
}

async fn get_pool(
    State(state): State<AppState>,
    Path((market, maturity)): Path<(MarketId, u64)>,
) -> ApiResult<PoolView> {
    let maturity = Maturity::new(maturity)?;
    let view = state
        .ledger
        .call(move |engine| -> tenor_common::Result<PoolView> {
            Ok(PoolView {
                maturity,
                state: engine.pool_state(&market, maturity)?,
                pool: engine.pool(&market, maturity)?.unwrap_or_default(),
            })
        })
        .await??;
    Ok(Json(view))
}

async fn quote_rate(
    State(state): State<AppState>,
    Path((market, maturity)): Path<(MarketId, u64)>,
    Query(query): Query<AmountQuery>,
) -> ApiResult<RateQuote> {
    let maturity = Maturity::new(maturity)?;
    let rate = state
        .ledger
        .rate_to_borrow(market, maturity, query.amount)
        .await?;
    Ok(Json(RateQuote {
        maturity,
        amount: query.amount,
        rate,
    }))
}

async fn quote_yield(
    State(state): State<AppState>,
    Path((market, maturity)): Path<(MarketId, u64)>,
    Query(query): Query<AmountQuery>,
) -> ApiResult<YieldQuote> {
    let maturity = Maturity::new(maturity)?;
    let (earned, smart_pool_fee) = state
        .ledger
        .yield_for_deposit(market, maturity, query.amount)
        .await?;
    Ok(Json(YieldQuote {
        maturity,
        amount: query.amount,
        earned,
        smart_pool_fee,
    }))
}

async fn deposit_to_maturity_pool(
    State(state): State<AppState>,
    Path((market, maturity)): Path<(MarketId, u64)>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<Receipt> {
    let maturity = Maturity::new(maturity)?;
    let receipt = state
        .ledger
        .deposit_to_maturity_pool(market, req.account, req.amount, maturity, req.min_amount_out)
        .await?;
    Ok(Json(receipt))
}

async fn borrow_from_maturity_pool(
    State(state): State<AppState>,
    Path((market, maturity)): Path<(MarketId, u64)>,
    Json(req): Json<BorrowRequest>,
) -> ApiResult<Receipt> {
    let maturity = Maturity::new(maturity)?;
    let receipt = state
        .ledger
        .borrow_from_maturity_pool(market, req.account, req.amount, maturity, req.max_amount_out)
        .await?;
    Ok(Json(receipt))
}

async fn repay_to_maturity_pool(
    State(state): State<AppState>,
    Path((market, maturity)): Path<(MarketId, u64)>,
    Json(req): Json<RepayRequest>,
) -> ApiResult<Receipt> {
    let maturity = Maturity::new(maturity)?;
    let payer = req.payer.unwrap_or_else(|| req.account.clone());
    let receipt = state
        .ledger
        .repay_to_maturity_pool(market, payer, req.account, req.amount, maturity)
        .await?;
    Ok(Json(receipt))
}

async fn withdraw_from_maturity_pool(
    State(state): State<AppState>,
    Path((market, maturity)): Path<(MarketId, u64)>,
    Json(req): Json<WithdrawRequest>,
) -> ApiResult<Receipt> {
    let maturity = Maturity::new(maturity)?;
    let receipt = state
        .ledger
        .withdraw_from_maturity_pool(market, req.account, req.amount, maturity)
        .await?;
    Ok(Json(receipt))
}

async fn account_snapshot(
    State(state): State<AppState>,
    Path((market, account)): Path<(MarketId, AccountId)>,
    Query(query): Query<SnapshotQuery>,
) -> ApiResult<AccountSnapshot> {
    let maturity = query.maturity.map(Maturity::new).transpose()?;
    let snapshot = state
        .ledger
        .account_snapshot(market, account, maturity)
        .await?;
    Ok(Json(snapshot))
}

async fn account_liquidity(
    State(state): State<AppState>,
    Path(account): Path<AccountId>,
) -> ApiResult<AccountLiquidity> {
    let liquidity = state.ledger.account_liquidity(account).await?;
    Ok(Json(liquidity))
}

async fn enter_markets(
    State(state): State<AppState>,
    Path(account): Path<AccountId>,
    Json(req): Json<EnterMarketsRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .ledger
        .call(move |engine| engine.enter_markets(&account, &req.markets))
        .await??;
    Ok(StatusCode::NO_CONTENT)
}

async fn exit_market(
    State(state): State<AppState>,
    Path((account, market)): Path<(AccountId, MarketId)>,
) -> Result<StatusCode, ApiError> {
    state
        .ledger
        .call(move |engine| engine.exit_market(&account, &market))
        .await??;
    Ok(StatusCode::NO_CONTENT)
}

async fn liquidate(
    State(state): State<AppState>,
    Json(req): Json<LiquidateRequest>,
) -> ApiResult<Receipt> {
    let maturity = Maturity::new(req.maturity)?;
    let receipt = state
        .ledger
        .liquidate(
            req.liquidator,
            req.borrower,
            req.debt_market,
            maturity,
            req.repay_amount,
            req.collateral_market,
        )
        .await?;
    Ok(Json(receipt))
}

async fn set_parameters(
    State(state): State<AppState>,
    Path(market): Path<MarketId>,
    Json(req): Json<ParametersRequest>,
) -> ApiResult<ParametersVersion> {
    let version = state
        .ledger
        .call(move |engine| engine.set_parameters(&req.caller, &market, req.params))
        .await??;
    Ok(Json(version))
}

async fn set_penalty_rate(
    State(state): State<AppState>,
    Path(market): Path<MarketId>,
    Json(req): Json<ValueRequest>,
) -> ApiResult<ParametersVersion> {
    let version = state
        .ledger
        .call(move |engine| engine.set_penalty_rate(&req.caller, &market, req.value))
        .await??;
    Ok(Json(version))
}

async fn set_smart_pool_fee_rate(
    State(state): State<AppState>,
    Path(market): Path<MarketId>,
    Json(req): Json<ValueRequest>,
) -> ApiResult<ParametersVersion> {
    let version = state
        .ledger
        .call(move |engine| engine.set_smart_pool_fee_rate(&req.caller, &market, req.value))
        .await??;
    Ok(Json(version))
}

async fn set_distribution_weighter(
    State(state): State<AppState>,
    Path(market): Path<MarketId>,
    Json(req): Json<ValueRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .ledger
        .call(move |engine| engine.set_distribution_weighter(&req.caller, &market, req.value))
        .await??;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_liquidation_fee(
    State(state): State<AppState>,
    Json(req): Json<ValueRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .ledger
        .call(move |engine| engine.set_liquidation_fee(&req.caller, req.value))
        .await??;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_market_borrow_caps(
    State(state): State<AppState>,
    Json(req): Json<BorrowCapsRequest>,
) -> Result<StatusCode, ApiError> {
    let caps = req.caps.into_iter().map(|c| (c.market, c.cap)).collect();
    state
        .ledger
        .call(move |engine| engine.set_market_borrow_caps(&req.caller, caps))
        .await??;
    Ok(StatusCode::NO_CONTENT)
}

async fn grant_role(
    State(state): State<AppState>,
    Json(req): Json<RoleRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .ledger
        .call(move |engine| engine.grant_role(&req.caller, req.account, req.role))
        .await??;
    Ok(StatusCode::NO_CONTENT)
}

async fn revoke_role(
    State(state): State<AppState>,
    Json(req): Json<RoleRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .ledger
        .call(move |engine| engine.revoke_role(&req.caller, &req.account, req.role))
        .await??;
    Ok(StatusCode::NO_CONTENT)
}

/// Move the simulated oracle; only administrators may do so
async fn set_price(
    State(state): State<AppState>,
    Json(req): Json<PriceRequest>,
) -> Result<StatusCode, ApiError> {
    if req.price <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount.into());
    }
    // Applied on the ledger queue, between two operations
    let (caller, market, price) = (req.caller.clone(), req.market.clone(), req.price);
    let oracle = state.oracle.clone();
    state
        .ledger
        .call(move |engine| -> tenor_common::Result<()> {
            engine.state().access.ensure_role(&caller, Role::Admin)?;
            engine.market(&market)?;
            oracle.set_price(market, price);
            Ok(())
        })
        .await??;
    info!(market = %req.market, price = %req.price, "oracle price set");
    Ok(StatusCode::NO_CONTENT)
}
