use std::io;
use std::sync::{Arc, Mutex};

use axum::Router;
use tracing::subscriber::DefaultGuard;

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Every invocation of `function` anywhere in a serialised expression, outermost first.
pub fn find_invocations<'a>(v: &'a serde_json::Value, function: &str) -> Vec<&'a serde_json::Value> {
    let mut out = Vec::new();
    collect(v, function, &mut out);
    out
}

fn collect<'a>(v: &'a serde_json::Value, function: &str, out: &mut Vec<&'a serde_json::Value>) {
    match v {
        serde_json::Value::Object(map) => {
            if map.get("functionName").and_then(|f| f.as_str()) == Some(function) {
                out.push(v);
            }
            map.values().for_each(|child| collect(child, function, out));
        }
        serde_json::Value::Array(items) => items.iter().for_each(|child| collect(child, function, out)),
        _ => {}
    }
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes events on the current thread into a [`LogBuffer`] until the guard drops.
pub fn capture_logs() -> (DefaultGuard, LogBuffer) {
    let buf = LogBuffer::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    (tracing::subscriber::set_default(subscriber), buf)
}
