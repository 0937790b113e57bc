//! Tests for the front-end pipe listener

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use emmy_protocol::{Frame, PipeListener, PipeTransporter, TransportEvent, Transporter};

fn endpoint_name(dir: &tempfile::TempDir) -> String
{
    if cfg!(windows) {
        format!("emmy-listener-test-{}", std::process::id())
    } else {
        dir.path().join("front-end.sock").to_string_lossy().into_owned()
    }
}

#[test]
fn test_listener_echoes_engine_frames()
{
    let dir = tempfile::tempdir().unwrap();
    let name = endpoint_name(&dir);
    let (bound_tx, bound_rx) = mpsc::channel();

    let front_end = {
        let name = name.clone();
        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async move {
                let mut listener = PipeListener::bind(&name).unwrap();
                bound_tx.send(()).unwrap();

                let mut connection = listener.accept().await.unwrap();
                let frame = connection.read_frame().await.unwrap().unwrap();
                connection
                    .write_frame(&Frame::new(frame.command_id + 1, frame.payload))
                    .await
                    .unwrap();
                // Drain until the engine goes away.
                while let Ok(Some(_)) = connection.read_frame().await {}
            });
        })
    };

    bound_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let transporter = PipeTransporter::new();
    let events = transporter.take_events().unwrap();
    transporter.connect(&name).unwrap();
    transporter.send(10, b"hello");

    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event, TransportEvent::Message(Frame::new(11, b"hello".to_vec())));

    transporter.stop();
    front_end.join().unwrap();
}

#[cfg(unix)]
#[test]
fn test_bind_leaves_regular_file_alone()
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "keep me").unwrap();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let result = runtime.block_on(async { PipeListener::bind(&path.to_string_lossy()) });

    assert!(result.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");
}

#[cfg(unix)]
#[test]
fn test_bind_replaces_stale_socket()
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stale.sock");
    // A std listener leaves its socket file behind when dropped.
    drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
    assert!(path.exists());

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let result = runtime.block_on(async { PipeListener::bind(&path.to_string_lossy()) });
    assert!(result.is_ok());
}
