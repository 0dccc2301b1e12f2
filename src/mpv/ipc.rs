//! mpv JSON IPC client.
//!
//! mpv listens on a Unix stream socket (`--input-ipc-server`).  Every
//! message is a single line of JSON followed by `\n`.
//!
//! # Wire format
//!
//! ```json
//! {"command":["loadfile","rtsp://cam/sub"],"request_id":3}
//! {"request_id":3,"error":"success","data":null}
//! {"command":["observe_property",2,"demuxer-cache-time"],"request_id":4}
//! {"event":"property-change","id":2,"name":"demuxer-cache-time","data":1.84}
//! ```
//!
//! A reader thread splits the incoming lines into replies, matched to the
//! pending request by `request_id`, and events.  Property changes and the
//! file lifecycle events (`start-file`, `file-loaded`, `end-file`, `idle`)
//! are translated into [`PlayerEvent`]s.  The event channel disconnects when the socket closes.

use crate::player::PlayerEvent;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Property names the supervisor observes.
pub const CACHE_IDLE: &str = "demuxer-cache-idle";
pub const CACHE_TIME: &str = "demuxer-cache-time";

/// How long a request may wait for its reply.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors produced by the IPC client.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no reply to {command} within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("control connection closed")]
    Disconnected,
    #[error("{command} failed: {error}")]
    Command { command: String, error: String },
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    command: &'a [Value],
    request_id: u64,
}

/// Any line mpv sends.  Replies carry `request_id`, events carry `event`.
#[derive(Debug, Deserialize)]
struct Incoming {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    request_id: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug)]
struct Reply {
    request_id: u64,
    error: String,
    data: Value,
}

/// Translate an mpv event into a [`PlayerEvent`].
fn translate(event: &str, name: Option<&str>, data: &Value) -> Option<PlayerEvent> {
    match event {
        "property-change" => match name? {
            CACHE_TIME => data.as_f64().map(PlayerEvent::CacheTime),
            CACHE_IDLE => data.as_bool().map(PlayerEvent::CacheIdle),
            _ => None,
        },
        "file-loaded" => Some(PlayerEvent::Loaded(true)),
        "start-file" | "end-file" | "idle" => Some(PlayerEvent::Loaded(false)),
        _ => None,
    }
}

/// A connected IPC client.
pub struct IpcConnection {
    stream: UnixStream,
    replies: Receiver<Reply>,
    reader: Option<JoinHandle<()>>,
    next_id: u64,
    timeout: Duration,
}

impl IpcConnection {
    /// Connect to the socket at `path`.  Property changes are sent to
    /// `events`.
    pub fn connect(path: &Path, events: Sender<PlayerEvent>) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(path)?;
        Self::from_stream(stream, events)
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: UnixStream, events: Sender<PlayerEvent>) -> Result<Self, IpcError> {
        let read_half = stream.try_clone()?;
        let (reply_tx, reply_rx) = unbounded();
        let reader = thread::Builder::new()
            .name("mpv-ipc".into())
            .spawn(move || read_loop(read_half, reply_tx, events))?;
        Ok(Self {
            stream,
            replies: reply_rx,
            reader: Some(reader),
            next_id: 1,
            timeout: REPLY_TIMEOUT,
        })
    }

    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a command and wait for its reply.  Returns the reply's `data`.
    pub fn command(&mut self, args: &[Value]) -> Result<Value, IpcError> {
        let request_id = self.next_id;
        self.next_id += 1;
        let mut line = serde_json::to_vec(&Request {
            command: args,
            request_id,
        })?;
        line.push(b'\n');
        self.stream.write_all(&line)?;

        let name = || {
            args.first()
                .and_then(Value::as_str)
                .unwrap_or("command")
                .to_string()
        };
        loop {
            match self.replies.recv_timeout(self.timeout) {
                Ok(reply) if reply.request_id != request_id => {
                    debug!("dropping stale reply {}", reply.request_id);
                }
                Ok(reply) if reply.error == "success" => return Ok(reply.data),
                Ok(reply) => {
                    return Err(IpcError::Command {
                        command: name(),
                        error: reply.error,
                    })
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(IpcError::Timeout {
                        command: name(),
                        timeout: self.timeout,
                    })
                }
                Err(RecvTimeoutError::Disconnected) => return Err(IpcError::Disconnected),
            }
        }
    }

    /// Subscribe to changes of property `name`.
    pub fn observe_property(&mut self, id: u64, name: &str) -> Result<(), IpcError> {
        self.command(&["observe_property".into(), id.into(), name.into()])
            .map(drop)
    }

    /// Shut the socket down and wait for the reader thread.
    pub fn close(&mut self) -> Result<(), IpcError> {
        let shutdown = match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != std::io::ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        };
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("ipc reader panicked");
            }
        }
        shutdown
    }
}

impl Drop for IpcConnection {
    fn drop(&mut self) {
        if self.reader.is_some() {
            let _ = self.close();
        }
    }
}

fn read_loop(stream: UnixStream, replies: Sender<Reply>, events: Sender<PlayerEvent>) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let text = match line {
            Ok(text) if text.trim().is_empty() => continue,
            Ok(text) => text,
            Err(e) => {
                debug!("ipc read error: {}", e);
                break;
            }
        };
        let msg = match serde_json::from_str::<Incoming>(&text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("bad ipc message: {} ({})", text, e);
                continue;
            }
        };
        match msg {
            Incoming {
                event: Some(event), ..
            } => {
                trace!("ipc event {}", text);
                if let Some(ev) = translate(&event, msg.name.as_deref(), &msg.data) {
                    // Nobody listening is fine.
                    let _ = events.send(ev);
                }
            }
            Incoming {
                request_id: Some(request_id),
                error,
                data,
                ..
            } => {
                let reply = Reply {
                    request_id,
                    error: error.unwrap_or_default(),
                    data,
                };
                if replies.send(reply).is_err() {
                    break;
                }
            }
            _ => debug!("unhandled ipc message: {}", text),
        }
    }
    debug!("ipc reader finished");
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("xmosaic-ipc-test-{}-{}.sock", std::process::id(), id))
    }

    /// Fake mpv: for every request line, write the scripted lines returned
    /// by `script` (with `{id}` replaced by the request id).
    fn fake_server(
        path: &Path,
        script: impl Fn(&Value) -> Vec<String> + Send + 'static,
    ) -> thread::JoinHandle<Vec<Value>> {
        let _ = std::fs::remove_file(path);
        let listener = UnixListener::bind(path).unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut seen = Vec::new();
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else { break };
                let req: Value = serde_json::from_str(&line).unwrap();
                let id = req["request_id"].as_u64().unwrap();
                for out in script(&req) {
                    let out = out.replace("{id}", &id.to_string());
                    writeln!(writer, "{}", out).unwrap();
                }
                seen.push(req);
            }
            seen
        })
    }

    #[test]
    fn command_round_trip() {
        let path = tmp_socket_path();
        let server = fake_server(&path, |req| {
            let data = if req["command"][0] == "get_property" { "42" } else { "null" };
            vec![format!(r#"{{"request_id":{{id}},"error":"success","data":{}}}"#, data)]
        });
        let (tx, _rx) = unbounded();
        let mut conn = IpcConnection::connect(&path, tx).unwrap();
        let data = conn.command(&["get_property".into(), "volume".into()]).unwrap();
        assert_eq!(data, Value::from(42));
        conn.command(&["loadfile".into(), "rtsp://cam".into()]).unwrap();
        conn.close().unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1]["command"], serde_json::json!(["loadfile", "rtsp://cam"]));
        assert_ne!(seen[0]["request_id"], seen[1]["request_id"]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn error_reply_becomes_command_error() {
        let path = tmp_socket_path();
        let _server = fake_server(&path, |_| {
            vec![r#"{"request_id":{id},"error":"property not found"}"#.to_string()]
        });
        let (tx, _rx) = unbounded();
        let mut conn = IpcConnection::connect(&path, tx).unwrap();
        let err = conn
            .command(&["set_property".into(), "nope".into(), true.into()])
            .unwrap_err();
        match err {
            IpcError::Command { command, error } => {
                assert_eq!(command, "set_property");
                assert_eq!(error, "property not found");
            }
            other => panic!("unexpected error: {other}"),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn property_changes_are_forwarded() {
        let path = tmp_socket_path();
        let _server = fake_server(&path, |_| {
            vec![
                r#"{"event":"property-change","id":2,"name":"demuxer-cache-time","data":3.5}"#.into(),
                r#"{"event":"playback-restart"}"#.into(),
                r#"{"event":"property-change","id":9,"name":"volume","data":100}"#.into(),
                r#"{"event":"property-change","id":1,"name":"demuxer-cache-idle","data":true}"#.into(),
                r#"{"request_id":{id},"error":"success"}"#.into(),
            ]
        });
        let (tx, rx) = unbounded();
        let mut conn = IpcConnection::connect(&path, tx).unwrap();
        conn.observe_property(2, CACHE_TIME).unwrap();
        let events: Vec<PlayerEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![PlayerEvent::CacheTime(3.5), PlayerEvent::CacheIdle(true)]
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn stale_replies_are_skipped() {
        let path = tmp_socket_path();
        let _server = fake_server(&path, |_| {
            vec![
                r#"{"request_id":999,"error":"success","data":"old"}"#.into(),
                r#"not json"#.into(),
                r#"{"request_id":{id},"error":"success","data":"new"}"#.into(),
            ]
        });
        let (tx, _rx) = unbounded();
        let mut conn = IpcConnection::connect(&path, tx).unwrap();
        assert_eq!(conn.command(&["stop".into()]).unwrap(), Value::from("new"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn silent_server_times_out() {
        let path = tmp_socket_path();
        let _server = fake_server(&path, |_| Vec::new());
        let (tx, _rx) = unbounded();
        let mut conn = IpcConnection::connect(&path, tx)
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let err = conn.command(&["stop".into()]).unwrap_err();
        assert!(matches!(err, IpcError::Timeout { .. }), "{err}");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn server_exit_disconnects_events() {
        let path = tmp_socket_path();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });
        let (tx, rx) = unbounded();
        let mut conn = IpcConnection::connect(&path, tx).unwrap();
        server.join().unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_err());
        assert!(rx.is_empty());
        assert!(conn.command(&["stop".into()]).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn file_lifecycle_events_are_forwarded() {
        let path = tmp_socket_path();
        let _server = fake_server(&path, |_| {
            vec![
                r#"{"request_id":{id},"error":"success"}"#.into(),
                r#"{"event":"start-file","playlist_entry_id":1}"#.into(),
                r#"{"event":"file-loaded"}"#.into(),
                r#"{"event":"end-file","reason":"error"}"#.into(),
                r#"{"event":"idle"}"#.into(),
            ]
        });
        let (tx, rx) = unbounded();
        let mut conn = IpcConnection::connect(&path, tx).unwrap();
        conn.command(&["loadfile".into(), "rtsp://cam".into()]).unwrap();
        let events: Vec<PlayerEvent> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                PlayerEvent::Loaded(false),
                PlayerEvent::Loaded(true),
                PlayerEvent::Loaded(false),
                PlayerEvent::Loaded(false),
            ]
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn translate_ignores_wrong_types() {
        let change = |name, data| translate("property-change", Some(name), &data);
        assert_eq!(change(CACHE_TIME, Value::from(1.0)), Some(PlayerEvent::CacheTime(1.0)));
        assert_eq!(change(CACHE_TIME, Value::Null), None);
        assert_eq!(change(CACHE_IDLE, Value::from(false)), Some(PlayerEvent::CacheIdle(false)));
        assert_eq!(change("pause", Value::from(true)), None);
        assert_eq!(translate("property-change", None, &Value::Null), None);
        assert_eq!(translate("seek", None, &Value::Null), None);
    }
}
