// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the cloud registry client using wiremock.

#![cfg(feature = "http")]

use washr_lib::discovery::LocalDevice;
use washr_lib::manager::DeviceDirectory;
use washr_lib::registry::{DeviceRegistry, HttpRegistryConfig, reconcile};
use washr_lib::{Error, ProtocolError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn devices_body() -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "result": {
            "devices": [
                {
                    "id": "bf111",
                    "name": "Washer Plug",
                    "category": "cz",
                    "local_key": "key-washer"
                },
                {
                    "id": "bf222",
                    "name": "Hallway Bulb",
                    "category": "dj",
                    "local_key": "key-bulb"
                },
                {
                    "id": "bf333",
                    "name": "Dryer Plug",
                    "category": "cz",
                    "local_key": "key-dryer"
                }
            ]
        }
    })
}

#[tokio::test]
async fn list_devices_returns_only_plugs() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-01/associated-users/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;

    let registry = HttpRegistryConfig::new(server.uri()).into_client().unwrap();
    let devices = registry.list_devices().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, "bf111");
    assert_eq!(devices[0].local_key, "key-washer");
    assert_eq!(devices[1].name, "Dryer Plug");
}

#[tokio::test]
async fn access_token_is_sent_as_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-01/associated-users/devices"))
        .and(header("access_token", "secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .expect(1)
        .mount(&server)
        .await;

    let registry = HttpRegistryConfig::new(server.uri())
        .with_access_token("secret-token")
        .into_client()
        .unwrap();

    assert!(registry.list_devices().await.is_ok());
}

#[tokio::test]
async fn rejected_envelope_surfaces_code_and_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-01/associated-users/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "code": 1010,
            "msg": "token invalid"
        })))
        .mount(&server)
        .await;

    let registry = HttpRegistryConfig::new(server.uri()).into_client().unwrap();
    let err = registry.list_devices().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::CloudRejected { code: 1010, .. })
    ));
}

#[tokio::test]
async fn http_error_status_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-01/associated-users/devices"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let registry = HttpRegistryConfig::new(server.uri()).into_client().unwrap();
    assert!(registry.list_devices().await.is_err());
}

#[tokio::test]
async fn discovered_devices_reconcile_against_live_registry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-01/associated-users/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;

    let registry = HttpRegistryConfig::new(server.uri()).into_client().unwrap();

    // One known plug, one stranger seen only on the LAN.
    let local = vec![
        LocalDevice {
            id: "bf111".to_string(),
            ip: "192.168.1.40".to_string(),
            version: "3.3".to_string(),
        },
        LocalDevice {
            id: "unknown".to_string(),
            ip: "192.168.1.41".to_string(),
            version: "3.3".to_string(),
        },
    ];

    let cloud = registry.list_devices().await.unwrap();
    let merged = reconcile(&local, &cloud);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].id, "bf111");
    assert_eq!(merged[0].name, "Washer Plug");
    assert_eq!(merged[0].local_key, "key-washer");
    assert_eq!(merged[0].ip, "192.168.1.40");
}

#[tokio::test]
async fn directory_caches_across_registry_outage() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/iot-01/associated-users/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // After the first call the server answers 500.
    Mock::given(method("GET"))
        .and(path("/v1.0/iot-01/associated-users/devices"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let registry = HttpRegistryConfig::new(server.uri()).into_client().unwrap();
    let directory = DeviceDirectory::new(registry);

    let local = vec![LocalDevice {
        id: "bf333".to_string(),
        ip: "192.168.1.50".to_string(),
        version: "3.4".to_string(),
    }];

    let first = directory.resolve_local(&local).await;
    assert_eq!(first.devices.len(), 1);
    assert!(!first.from_cache);

    // Registry is now down; the cached reconciliation is served, flagged.
    let second = directory.resolve_local(&local).await;
    assert_eq!(second.devices.len(), 1);
    assert!(second.from_cache);
    assert_eq!(second.devices[0].name, "Dryer Plug");
}
