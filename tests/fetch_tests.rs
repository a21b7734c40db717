use std::io::{Read, Write};
use std::net::TcpListener;

use lumen_viewer::assets;

/// Serves exactly one canned HTTP response on a loopback port.
fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            let header = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(&body);
        }
    });

    format!("http://{addr}/models/scene/scene.dae.zip")
}

#[test]
fn status_200_returns_the_body() {
    let url = serve_once("200 OK", b"archive bytes".to_vec());

    let mut last_progress = None;
    let bytes = assets::fetch_bytes(&url, &mut |loaded, total| {
        last_progress = Some((loaded, total));
    })
    .unwrap();

    assert_eq!(bytes, b"archive bytes");
    assert_eq!(last_progress, Some((13, 13)));
}

#[test]
fn status_404_fails_with_the_status_text() {
    let url = serve_once("404 Not Found", Vec::new());

    let err = assets::fetch_bytes(&url, &mut |_, _| {}).unwrap_err();
    assert_eq!(err.to_string(), "Not Found");
}

#[test]
fn status_500_fails_with_the_status_text() {
    let url = serve_once("500 Internal Server Error", Vec::new());

    let err = assets::fetch_bytes(&url, &mut |_, _| {}).unwrap_err();
    assert_eq!(err.to_string(), "Internal Server Error");
}

#[test]
fn missing_local_file_is_an_error() {
    let err = assets::fetch_bytes("/definitely/not/here.zip", &mut |_, _| {}).unwrap_err();
    assert!(format!("{err:#}").contains("not/here.zip"));
}
