use std::{convert::Infallible, future::Future, net::SocketAddr, sync::Arc};

use log::{debug, info, warn};
use serde::Deserialize;
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{InvalidQuery, Reject},
    Filter, Rejection, Reply,
};

use crate::{
    error::{ServerError, StoreError},
    model::{Client, DepthOrder, HistoryOrder},
    statistics::Statistics,
};

/// `/get-order-book` 与 `/save-order-book` 的查询参数，两者都必须提供。
#[derive(Clone, Debug, Deserialize)]
pub struct BookQuery
{
    pub exchange_name: String,
    pub pair: String,
}

/// `/save-order-history` 的请求体：可以显式给出查询键，也可以只给订单，此时查询键取自订单本身。
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum SaveOrderRequest
{
    Keyed
    {
        client: Client, order: HistoryOrder
    },
    Bare(HistoryOrder),
}

impl SaveOrderRequest
{
    pub fn into_parts(self) -> (Client, HistoryOrder)
    {
        match self {
            | SaveOrderRequest::Keyed { client, order } => (client, order),
            | SaveOrderRequest::Bare(order) => (Client::from(&order), order),
        }
    }
}

#[derive(Debug)]
struct StoreRejection
{
    context: &'static str,
    error: StoreError,
}

impl Reject for StoreRejection {}

fn store_rejection(context: &'static str) -> impl FnOnce(StoreError) -> Rejection
{
    move |error| warp::reject::custom(StoreRejection { context, error })
}

fn with_store(store: Arc<dyn Statistics>) -> impl Filter<Extract = (Arc<dyn Statistics>,), Error = Infallible> + Clone
{
    warp::any().map(move || store.clone())
}

/// 四个路由，均不限定 HTTP 方法。
pub fn routes(store: Arc<dyn Statistics>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone
{
    let get_order_book = warp::path!("get-order-book").and(warp::query::<BookQuery>())
                                                      .and(with_store(store.clone()))
                                                      .and_then(get_order_book);

    let save_order_book = warp::path!("save-order-book").and(warp::query::<BookQuery>())
                                                        .and(warp::body::json::<Vec<DepthOrder>>())
                                                        .and(with_store(store.clone()))
                                                        .and_then(save_order_book);

    let get_order_history = warp::path!("get-order-history").and(warp::body::json::<Client>())
                                                            .and(with_store(store.clone()))
                                                            .and_then(get_order_history);

    let save_order_history = warp::path!("save-order-history").and(warp::body::json::<SaveOrderRequest>())
                                                              .and(with_store(store))
                                                              .and_then(save_order_history);

    get_order_book.or(save_order_book).or(get_order_history).or(save_order_history).recover(handle_rejection)
}

async fn get_order_book(query: BookQuery, store: Arc<dyn Statistics>) -> Result<warp::reply::Json, Rejection>
{
    let levels = store.get_order_book(&query.exchange_name, &query.pair).await.map_err(store_rejection("failed to get order book"))?;
    debug!("[OrderStat] : served {} levels for exchange={}, pair={}", levels.len(), query.exchange_name, query.pair);
    Ok(warp::reply::json(&levels))
}

async fn save_order_book(query: BookQuery, levels: Vec<DepthOrder>, store: Arc<dyn Statistics>) -> Result<StatusCode, Rejection>
{
    store.save_order_book(&query.exchange_name, &query.pair, &levels).await.map_err(store_rejection("failed to save order book"))?;
    Ok(StatusCode::OK)
}

async fn get_order_history(client: Client, store: Arc<dyn Statistics>) -> Result<warp::reply::Json, Rejection>
{
    let orders = store.get_order_history(&client).await.map_err(store_rejection("failed to get order history"))?;
    Ok(warp::reply::json(&orders))
}

async fn save_order_history(request: SaveOrderRequest, store: Arc<dyn Statistics>) -> Result<StatusCode, Rejection>
{
    let (client, order) = request.into_parts();
    store.save_order(&client, &order).await.map_err(store_rejection("failed to save order"))?;
    Ok(StatusCode::OK)
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible>
{
    let (status, message) = if let Some(rejection) = err.find::<StoreRejection>() {
        let status = if rejection.error.is_caller_error() { StatusCode::BAD_REQUEST } else { StatusCode::INTERNAL_SERVER_ERROR };
        (status, format!("{}: {}", rejection.context, rejection.error))
    }
    else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("failed to decode request body: {}", e))
    }
    else if let Some(e) = err.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, format!("failed to decode query parameters: {}", e))
    }
    else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    }
    else {
        (StatusCode::BAD_REQUEST, format!("rejected request: {:?}", err))
    };

    if status.is_server_error() {
        warn!("[OrderStat] : {}", message);
    }
    else {
        debug!("[OrderStat] : {} {}", status, message);
    }
    Ok(warp::reply::with_status(message, status))
}

/// 绑定端口并返回实际监听地址与服务 future。`shutdown` 完成后服务停止接收新连接，
/// 等待进行中的请求结束，然后关闭存储。
pub fn bind(addr: SocketAddr,
            store: Arc<dyn Statistics>,
            shutdown: impl Future<Output = ()> + Send + 'static)
            -> Result<(SocketAddr, impl Future<Output = Result<(), ServerError>>), ServerError>
{
    let (bound, server) = warp::serve(routes(store.clone())).try_bind_with_graceful_shutdown(addr, shutdown)?;
    info!("[OrderStat] : HTTP server listening on {}", bound);

    let serve = async move {
        server.await;
        info!("[OrderStat] : HTTP server stopped, closing the statistics store.");
        store.close().await?;
        Ok(())
    };
    Ok((bound, serve))
}

pub async fn run_server(addr: SocketAddr, store: Arc<dyn Statistics>, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), ServerError>
{
    let (_, serve) = bind(addr, store, shutdown)?;
    serve.await
}
