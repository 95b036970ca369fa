//! Dispatcher and search paths against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `ApiClient` over real
//! HTTP with `UreqTransport`. A recording navigator and an in-memory store
//! stand in for the browser.

use std::io::{BufRead, BufReader, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tienda_core::{
    ApiClient, ApiError, ApiRequest, ClientConfig, CredentialStore, Credentials, ErrorCode,
    MemoryStore, MultipartForm, Navigator, PageContext, UreqTransport,
};

#[derive(Default)]
struct Recorder {
    navigations: Mutex<Vec<String>>,
    alerts: Mutex<Vec<String>>,
}

impl Navigator for Recorder {
    fn navigate(&self, location: &str) {
        self.navigations.lock().unwrap().push(location.to_string());
    }

    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
}

struct Fixture {
    client: ApiClient,
    store: Arc<MemoryStore>,
    nav: Arc<Recorder>,
}

/// Start the mock server on a random port and return its address.
fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

/// Serve one canned raw response per queued entry, in order, then stop.
fn start_raw_server(responses: Vec<(&'static str, &'static [u8])>) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        for (status_line, body) in responses {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )
            .unwrap();
            stream.write_all(body).unwrap();
            stream.flush().unwrap();
        }
    });
    addr
}

fn fixture(base_url: String) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let nav = Arc::new(Recorder::default());
    let config = ClientConfig::default().with_base_url(base_url);
    let client = ApiClient::new(
        config,
        Arc::new(UreqTransport::default()),
        store.clone(),
        nav.clone(),
    );
    Fixture { client, store, nav }
}

fn login(f: &Fixture, token: &str) {
    Credentials::new(token, vec!["cliente".to_string()])
        .save(&*f.store, f.client.config())
        .unwrap();
}

#[test]
fn storefront_flows_over_http() {
    let addr = start_server();
    let f = fixture(format!("http://{addr}/api"));
    let home = f.client.page("/productos.html");

    // Public listing.
    let productos = f
        .client
        .dispatch(&home, ApiRequest::get("/productos").public())
        .unwrap()
        .unwrap();
    assert_eq!(productos.as_array().unwrap().len(), 4);

    // Search helper, encoded term.
    let found = f.client.search_products("zapatos").unwrap();
    assert_eq!(found.as_array().unwrap().len(), 2);
    let found = f.client.search_products("botas de montaña").unwrap();
    assert_eq!(found[0]["id"], 3);

    // Authenticated request without a token never leaves the process.
    let perfil_page = f.client.page("/perfil/datos");
    let err = f
        .client
        .dispatch(&perfil_page, ApiRequest::get("/perfil"))
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NoAuthToken));
    assert!(f.nav.navigations.lock().unwrap().is_empty());

    // With the demo token the profile loads.
    login(&f, mock_server::DEMO_TOKEN);
    let perfil = f
        .client
        .dispatch(&perfil_page, ApiRequest::get("/perfil"))
        .unwrap()
        .unwrap();
    assert_eq!(perfil["nombre"], "Ana");

    // JSON body on POST.
    let checkout = f.client.page("/checkout.html");
    let pedido = f
        .client
        .dispatch(
            &checkout,
            ApiRequest::post("/pedidos").json(json!([{"producto": 1, "cantidad": 2}])),
        )
        .unwrap()
        .unwrap();
    assert_eq!(pedido["lineas"][0]["cantidad"], 2);

    // 204 becomes None.
    let vacio = f
        .client
        .dispatch(&checkout, ApiRequest::delete("/carrito"))
        .unwrap();
    assert!(vacio.is_none());

    // Multipart upload: the transport picks the boundary.
    let form = MultipartForm::new()
        .text("titulo", "Bota")
        .file("imagen", "bota.png", "image/png", b"PNG!".to_vec());
    let subida = f
        .client
        .dispatch(
            &f.client.page("/admin/productos"),
            ApiRequest::post("/productos/imagen").form(form),
        )
        .unwrap()
        .unwrap();
    assert_eq!(subida["campos"][0]["nombre"], "titulo");
    assert_eq!(subida["campos"][1]["bytes"], 4);

    // Public page error: status kept, no alert.
    let err = f
        .client
        .dispatch(&home, ApiRequest::get("/estado/500").public())
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "estado 500");
    assert!(f.nav.alerts.lock().unwrap().is_empty());

    // Private page error: alert with the server message.
    let err = f
        .client
        .dispatch(&checkout, ApiRequest::get("/estado/409").public())
        .unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert_eq!(*f.nav.alerts.lock().unwrap(), vec!["estado 409".to_string()]);
}

#[test]
fn rejected_token_on_admin_page_logs_out() {
    let addr = start_server();
    let f = fixture(format!("http://{addr}/api"));
    login(&f, "caducado");

    let err = f
        .client
        .dispatch(&f.client.page("/admin/panel"), ApiRequest::get("/perfil"))
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "Token inválido o ausente");
    assert!(f.store.get("jwt_token").is_none());
    assert!(f.store.get("user_roles").is_none());
    assert_eq!(
        *f.nav.navigations.lock().unwrap(),
        vec!["/index.html".to_string()]
    );
}

#[test]
fn rejected_token_on_public_page_keeps_session() {
    let addr = start_server();
    let f = fixture(format!("http://{addr}/api"));
    login(&f, "caducado");

    let err = f
        .client
        .dispatch(&PageContext::public("/productos.html"), ApiRequest::get("/perfil"))
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(f.store.get("jwt_token").as_deref(), Some("caducado"));
    assert!(f.nav.navigations.lock().unwrap().is_empty());
}

#[test]
fn search_reports_status_for_missing_route() {
    let addr = start_server();
    let f = fixture(format!("http://{addr}/api/retirado"));
    let err = f.client.search_products("zapatos").unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("404"));
}

#[test]
fn unreachable_backend_is_a_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let f = fixture(format!("http://127.0.0.1:{port}/api"));
    let err = f
        .client
        .dispatch(&f.client.page("/admin"), ApiRequest::get("/productos").public())
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert_eq!(err.status(), None);
    assert_eq!(f.nav.alerts.lock().unwrap().len(), 1);
}

#[test]
fn non_utf8_bodies_keep_the_status() {
    let addr = start_raw_server(vec![
        ("500 Internal Server Error", &b"\xff\xfe error \xe9"[..]),
        ("200 OK", &b"\xff\xfe\x00binary"[..]),
    ]);
    let f = fixture(format!("http://{addr}/api"));
    let home = PageContext::public("/productos.html");

    let err = f
        .client
        .dispatch(&home, ApiRequest::get("/productos").public())
        .unwrap_err();
    assert!(matches!(err, ApiError::Http { .. }), "got {err:?}");
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "Error 500: Internal Server Error");

    let out = f
        .client
        .dispatch(&home, ApiRequest::get("/productos").public())
        .unwrap();
    assert!(out.is_none());
}
