use futures_util::{SinkExt, StreamExt};
use tokio::io;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use keeper_core::proto::{Envelope, Request, Response};

pub type FramedStream = Framed<tokio::net::UnixStream, LengthDelimitedCodec>;

pub fn framed(stream: tokio::net::UnixStream) -> FramedStream {
    Framed::new(stream, LengthDelimitedCodec::new())
}

pub async fn send_request(framed: &mut FramedStream, req: &Envelope<Request>) -> io::Result<()> {
    let bytes = serde_json::to_vec(req)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    framed.send(tokio_util::bytes::Bytes::from(bytes)).await
}

pub async fn read_response(framed: &mut FramedStream) -> io::Result<Envelope<Response>> {
    let frame = framed
        .next()
        .await
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "socket closed"))??;

    serde_json::from_slice::<Envelope<Response>>(&frame)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// `Ok(None)` once the peer has closed the connection.
pub async fn read_request(framed: &mut FramedStream) -> io::Result<Option<Envelope<Request>>> {
    let Some(frame) = framed.next().await else {
        return Ok(None);
    };
    let frame = frame?;
    serde_json::from_slice::<Envelope<Request>>(&frame)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub async fn send_response(framed: &mut FramedStream, resp: &Envelope<Response>) -> io::Result<()> {
    let bytes = serde_json::to_vec(resp)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    framed.send(tokio_util::bytes::Bytes::from(bytes)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use keeper_core::proto::{BackupLocation, Tier};
    use tokio::net::UnixStream;

    #[tokio::test]
    async fn request_and_response_cross_the_socket() {
        let (client, server) = UnixStream::pair().expect("socket pair");
        let mut client = framed(client);
        let mut server = framed(server);

        send_request(
            &mut client,
            &Envelope {
                id: 7,
                payload: Request::Promote {
                    account_id: "111".into(),
                    tier: Tier::Trusted,
                },
            },
        )
        .await
        .expect("send request");

        let req = read_request(&mut server).await.expect("read").expect("frame");
        assert_eq!(req.id, 7);
        assert!(matches!(req.payload, Request::Promote { tier: Tier::Trusted, .. }));

        send_response(
            &mut server,
            &Envelope {
                id: 7,
                payload: Response::Unlinked { account_id: "111".into() },
            },
        )
        .await
        .expect("send response");
        let resp = read_response(&mut client).await.expect("response");
        assert!(matches!(resp.payload, Response::Unlinked { .. }));

        send_request(
            &mut client,
            &Envelope {
                id: 8,
                payload: Request::ListBackups { location: BackupLocation::Remote },
            },
        )
        .await
        .expect("send list");
        drop(client);
        assert!(read_request(&mut server).await.expect("list frame").is_some());
        assert!(read_request(&mut server).await.expect("eof").is_none());
    }
}
