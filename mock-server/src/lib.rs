use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Token accepted by a freshly built app.
pub const DEMO_TOKEN: &str = "token-demo";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Producto {
    pub id: u32,
    pub nombre: String,
    pub precio: f64,
}

#[derive(Deserialize)]
pub struct Busqueda {
    #[serde(default)]
    pub termino: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pedido {
    pub id: Uuid,
    pub lineas: Value,
}

#[derive(Clone)]
pub struct AppState {
    pub catalogo: Arc<Vec<Producto>>,
    pub tokens: Arc<RwLock<HashSet<String>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            catalogo: Arc::new(catalogo()),
            tokens: Arc::new(RwLock::new(HashSet::from([DEMO_TOKEN.to_string()]))),
        }
    }
}

fn catalogo() -> Vec<Producto> {
    [
        (1, "Zapatos de cuero", 79.9),
        (2, "Zapatos deportivos", 59.5),
        (3, "Botas de montaña", 120.0),
        (4, "Sandalias", 25.0),
    ]
    .into_iter()
    .map(|(id, nombre, precio)| Producto {
        id,
        nombre: nombre.to_string(),
        precio,
    })
    .collect()
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    let api = Router::new()
        .route("/productos", get(list_productos))
        .route("/productos/buscar", get(buscar_productos))
        .route("/productos/imagen", post(subir_imagen))
        .route("/perfil", get(perfil))
        .route("/pedidos", post(crear_pedido))
        .route("/carrito", delete(vaciar_carrito))
        .route("/estado/{code}", get(estado));
    Router::new().nest("/api", api).with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "Token inválido o ausente"})),
    )
        .into_response()
}

async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;
    if state.tokens.read().await.contains(token) {
        Ok(token.to_string())
    } else {
        Err(unauthorized())
    }
}

async fn list_productos(State(state): State<AppState>) -> Json<Vec<Producto>> {
    Json(state.catalogo.as_ref().clone())
}

async fn buscar_productos(
    State(state): State<AppState>,
    Query(q): Query<Busqueda>,
) -> Json<Vec<Producto>> {
    let termino = q.termino.to_lowercase();
    Json(
        state
            .catalogo
            .iter()
            .filter(|p| p.nombre.to_lowercase().contains(&termino))
            .cloned()
            .collect(),
    )
}

async fn perfil(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match authorize(&state, &headers).await {
        Ok(token) => Json(json!({"nombre": "Ana", "token": token})).into_response(),
        Err(resp) => resp,
    }
}

async fn crear_pedido(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(lineas): Json<Value>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers).await {
        return resp;
    }
    let pedido = Pedido {
        id: Uuid::new_v4(),
        lineas,
    };
    (StatusCode::CREATED, Json(pedido)).into_response()
}

async fn vaciar_carrito(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match authorize(&state, &headers).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(resp) => resp,
    }
}

async fn subir_imagen(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(resp) = authorize(&state, &headers).await {
        return resp;
    }
    let mut campos = Vec::new();
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();
                let filename = field.file_name().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => campos.push(json!({
                        "nombre": name,
                        "archivo": filename,
                        "bytes": bytes.len(),
                    })),
                    Err(e) => return (StatusCode::BAD_REQUEST, e.body_text()).into_response(),
                }
            }
            Ok(None) => break,
            Err(e) => return (StatusCode::BAD_REQUEST, e.body_text()).into_response(),
        }
    }
    (StatusCode::CREATED, Json(json!({ "campos": campos }))).into_response()
}

async fn estado(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) if status == StatusCode::NO_CONTENT => status.into_response(),
        Ok(status) => (status, Json(json!({"error": format!("estado {code}")}))).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}
