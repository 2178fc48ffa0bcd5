mod common;

use binanceapi::core::kernel::{StreamKind, WsSession};
use binanceapi::exchanges::binance::types::StreamMessage;
use binanceapi::{BinanceStreams, ExchangeError};
use common::serve_websocket_once;
use futures_util::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

const AGG_TRADE: &str = r#"{"e":"aggTrade","E":123456789,"s":"BNBBTC","a":12345,"p":"0.001","q":"100","f":100,"l":105,"T":123456785,"m":true,"M":true}"#;

#[tokio::test]
async fn test_frames_arrive_in_order_then_closed() {
    let root = serve_websocket_once(|mut ws| async move {
        for text in ["one", "two", "three"] {
            ws.send(Message::Text(text.to_string())).await.unwrap();
        }
        ws.close(None).await.unwrap();
    })
    .await;

    let mut ws = BinanceStreams::new(root)
        .open_raw_stream("bnbbtc@aggTrade")
        .await
        .unwrap();
    assert_eq!(ws.kind(), StreamKind::Single);
    assert!(ws.url().ends_with("/ws/bnbbtc@aggTrade"));

    assert_eq!(ws.next_raw().await.unwrap(), b"one");
    assert_eq!(ws.next_raw().await.unwrap(), b"two");
    assert_eq!(ws.next_raw().await.unwrap(), b"three");

    assert!(matches!(ws.next_raw().await, Err(ExchangeError::ConnectionClosed)));
    assert!(matches!(ws.next_raw().await, Err(ExchangeError::ConnectionClosed)));
    assert!(!ws.is_connected());
}

#[tokio::test]
async fn test_dropped_connection_is_terminal_then_closed() {
    let root = serve_websocket_once(|ws| async move { drop(ws) }).await;

    let mut ws = BinanceStreams::new(root)
        .open_raw_stream("bnbbtc@aggTrade")
        .await
        .unwrap();

    let first = ws.next_raw().await.unwrap_err();
    assert!(first.is_terminal(), "{:?}", first);
    assert!(!ws.is_connected());
    assert!(matches!(ws.next_raw().await, Err(ExchangeError::ConnectionClosed)));
    assert!(matches!(ws.next_raw().await, Err(ExchangeError::ConnectionClosed)));
}

#[tokio::test]
async fn test_ping_answered_and_not_surfaced() {
    let (pong_tx, pong_rx) = oneshot::channel();
    let root = serve_websocket_once(|mut ws| async move {
        ws.send(Message::Ping(vec![1, 2, 3])).await.unwrap();
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Pong(data) = message {
                let _ = pong_tx.send(data);
                break;
            }
        }
        ws.send(Message::Text("after ping".to_string())).await.unwrap();
        while ws.next().await.is_some() {}
    })
    .await;

    let mut ws = BinanceStreams::new(root)
        .open_raw_stream("bnbbtc@ticker")
        .await
        .unwrap();

    assert_eq!(ws.next_raw().await.unwrap(), b"after ping");
    assert_eq!(pong_rx.await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_close_handle_interrupts_pending_read() {
    let root = serve_websocket_once(|mut ws| async move {
        while ws.next().await.is_some() {}
    })
    .await;

    let mut ws = BinanceStreams::new(root)
        .open_raw_stream("bnbbtc@depth5")
        .await
        .unwrap();
    let handle = ws.close_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.close();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), ws.next_raw())
        .await
        .expect("close handle did not interrupt the read");
    assert!(matches!(result, Err(ExchangeError::ConnectionClosed)));
    assert!(!ws.is_connected());
    assert!(matches!(ws.next_raw().await, Err(ExchangeError::ConnectionClosed)));
}

#[tokio::test]
async fn test_explicit_close_is_idempotent() {
    let root = serve_websocket_once(|mut ws| async move {
        while ws.next().await.is_some() {}
    })
    .await;

    let mut ws = BinanceStreams::new(root)
        .open_raw_stream("!ticker@arr")
        .await
        .unwrap();

    ws.close().await.unwrap();
    ws.close().await.unwrap();
    assert!(!ws.is_connected());
    assert!(matches!(ws.next_raw().await, Err(ExchangeError::ConnectionClosed)));
}

#[tokio::test]
async fn test_combined_stream_decodes_and_routes() {
    let root = serve_websocket_once(|mut ws| async move {
        let frames = [
            format!(r#"{{"stream":"bnbbtc@aggTrade","data":{}}}"#, AGG_TRADE),
            r#"{"stream":"bnbbtc@kline_1m","data":{}}"#.to_string(),
            format!(r#"{{"stream":"bnbbtc@aggTrade","data":{}}}"#, AGG_TRADE),
        ];
        for frame in frames {
            ws.send(Message::Text(frame)).await.unwrap();
        }
        ws.close(None).await.unwrap();
    })
    .await;

    let mut ws = BinanceStreams::new(root)
        .combined()
        .subscribe_agg_trade("BNBBTC")
        .subscribe("bnbbtc@kline_1m")
        .connect()
        .await
        .unwrap();
    assert_eq!(ws.kind(), StreamKind::Combined);
    assert!(ws
        .url()
        .ends_with("/stream?streams=bnbbtc@aggTrade/bnbbtc@kline_1m"));

    let first = ws.next_message().await.unwrap();
    assert_eq!(first.stream, "bnbbtc@aggTrade");
    match first.message {
        StreamMessage::AggTrade(trade) => {
            assert_eq!(trade.symbol, "BNBBTC");
            assert_eq!(trade.quote_quantity(), dec!(0.1));
        }
        other => panic!("expected aggTrade, got {:?}", other),
    }

    match ws.next_message().await {
        Err(ExchangeError::UnknownStreamType(stream)) => assert_eq!(stream, "bnbbtc@kline_1m"),
        other => panic!("expected UnknownStreamType, got {:?}", other),
    }

    // an unknown stream does not end the connection
    assert!(ws.next_message().await.is_ok());
    assert!(matches!(ws.next_message().await, Err(ExchangeError::ConnectionClosed)));
}

#[tokio::test]
async fn test_user_data_stream_decodes_events() {
    let root = serve_websocket_once(|mut ws| async move {
        let report = r#"{"e":"executionReport","E":1499405658658,"s":"ETHBTC","c":"mUvoqJxFIILMdfAW5iGSOW","S":"BUY","o":"LIMIT","f":"GTC","q":"1.00000000","p":"0.10264410","P":"0.00000000","F":"0.00000000","g":-1,"C":"null","x":"NEW","X":"NEW","r":"NONE","i":4293153,"l":"0.00000000","z":"0.00000000","L":"0.00000000","n":"0","N":null,"T":1499405658657,"t":-1,"I":8641984,"w":true,"m":false,"M":false,"O":1499405658657,"Z":"0.00000000"}"#;
        ws.send(Message::Text(report.to_string())).await.unwrap();
        ws.send(Message::Text(r#"{"e":"balanceUpdate","E":1}"#.to_string()))
            .await
            .unwrap();
        ws.close(None).await.unwrap();
    })
    .await;

    let mut ws = BinanceStreams::new(root)
        .open_user_data_stream("pqia91ma19a5s61cv6a81va65sdf19v8a65a1")
        .await
        .unwrap();

    match ws.next_message().await.unwrap() {
        StreamMessage::ExecutionReport(report) => {
            assert_eq!(report.symbol, "ETHBTC");
            assert_eq!(report.order_id, 4_293_153);
            assert_eq!(report.quantity, dec!(1));
        }
        other => panic!("expected executionReport, got {:?}", other),
    }

    match ws.next_message().await {
        Err(ExchangeError::UnknownStreamType(event)) => assert_eq!(event, "balanceUpdate"),
        other => panic!("expected UnknownStreamType, got {:?}", other),
    }
}
