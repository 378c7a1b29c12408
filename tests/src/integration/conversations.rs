//! Full protocol conversations against the engine and the in-memory
//! identity store.

#[cfg(test)]
mod tests {
    use crate::mock_client::MockSqrlClient;
    use sqrl_engine::adapters::memory_store::MemoryIdentityStore;
    use sqrl_engine::{
        EngineConfig, IdentityRecord, IdentityStore, ProtocolEngine, RequestMeta, SqrlProtocolApi,
    };
    use sqrl_wire::envelope::{ClientParameters, Command, OptFlag};
    use sqrl_wire::{base64url, nv, ServerReply, Tif};
    use std::collections::HashMap;
    use std::sync::Arc;

    // =========================================================================
    // FIXTURES
    // =========================================================================

    fn test_config() -> EngineConfig {
        EngineConfig {
            local_domain_name: "example.com".to_string(),
            url_path: "/sqrl".to_string(),
            client_login_success_url: "https://example.com/loggedIn".to_string(),
            client_cancel_auth_url: Some("https://example.com/cancelled".to_string()),
            ..EngineConfig::default()
        }
    }

    fn engine() -> (ProtocolEngine<MemoryIdentityStore>, Arc<MemoryIdentityStore>) {
        let store = Arc::new(MemoryIdentityStore::new());
        (
            ProtocolEngine::new(test_config(), Arc::clone(&store)),
            store,
        )
    }

    async fn send(
        engine: &ProtocolEngine<MemoryIdentityStore>,
        fields: &HashMap<String, String>,
    ) -> (u16, ServerReply) {
        let response = engine.handle(fields, RequestMeta::default()).await;
        let reply = ServerReply::from_base64(&response.body).expect("reply must decode");
        (response.status, reply)
    }

    // =========================================================================
    // S1: query then ident for an unknown user
    // =========================================================================

    #[tokio::test]
    async fn query_then_ident_creates_user_and_marks_origin() {
        let (engine, store) = engine();
        let client = MockSqrlClient::new();
        let origin = engine.issue_login_url().await;
        assert!(origin.url.starts_with("sqrl://example.com/sqrl?nut="));

        let first = client.envelope(
            Command::Query,
            &MockSqrlClient::server_echo_of_url(&origin.url),
            &[],
        );
        let (status, reply) = send(&engine, &first).await;
        assert_eq!(status, 200);
        assert_eq!(reply.tif, Tif::empty(), "unknown user probes clean");
        assert_eq!(reply.query_path, format!("/sqrl?nut={}", reply.nut));

        // the second message echoes the reply body and presents the new nut
        let second = client.envelope(Command::Ident, &reply_echo(&reply), &[]);
        let (status, reply) = send(&engine, &second).await;
        assert_eq!(status, 200);
        assert_eq!(reply.tif, Tif::empty(), "store created the user");

        assert_eq!(store.identity_count(), 1);
        assert!(engine.registry().lookup(&origin.nut).unwrap().logged_in);
    }

    fn reply_echo(reply: &ServerReply) -> String {
        reply.to_base64()
    }

    // =========================================================================
    // S2: returning user
    // =========================================================================

    #[tokio::test]
    async fn returning_user_query_reports_current_id_match() {
        let (engine, store) = engine();
        let client = MockSqrlClient::new();
        store.insert_identity(IdentityRecord {
            primary_identity_public_key: client.identity_key().to_bytes(),
            ..IdentityRecord::default()
        });

        let origin = engine.issue_login_url().await;
        let fields = client.envelope(
            Command::Query,
            &MockSqrlClient::server_echo_of_url(&origin.url),
            &[],
        );
        let (status, reply) = send(&engine, &fields).await;
        assert_eq!(status, 200);
        assert_eq!(reply.tif, Tif::CURRENT_ID_MATCH);
        assert_eq!(reply.tif.to_hex(), "1");
    }

    // =========================================================================
    // S3: key rotation
    // =========================================================================

    #[tokio::test]
    async fn rotation_rebinds_primary_and_keeps_previous() {
        let (engine, store) = engine();
        let old_client = MockSqrlClient::new();
        let old_key = old_client.identity_key().to_bytes();
        store.insert_identity(IdentityRecord {
            primary_identity_public_key: old_key,
            ..IdentityRecord::default()
        });

        let rotated = old_client.rotated();
        let origin = engine.issue_login_url().await;

        let query = rotated.envelope(
            Command::Query,
            &MockSqrlClient::server_echo_of_url(&origin.url),
            &[],
        );
        let (_, reply) = send(&engine, &query).await;
        assert_eq!(reply.tif, Tif::PREVIOUS_ID_MATCH);

        let ident = rotated.envelope(Command::Ident, &reply_echo(&reply), &[]);
        let (status, reply) = send(&engine, &ident).await;
        assert_eq!(status, 200);
        assert_eq!(reply.tif, Tif::CURRENT_ID_MATCH | Tif::PREVIOUS_ID_MATCH);
        assert_eq!(reply.tif.to_hex(), "3");

        let new_key = rotated.identity_key().to_bytes();
        let identity = store.get_identity(&new_key).await.unwrap().unwrap();
        assert_eq!(identity.primary_identity_public_key, new_key);
        assert!(identity.previous_identity_public_keys.contains(&old_key));
        assert!(store.get_identity(&old_key).await.unwrap().is_none());
    }

    // =========================================================================
    // S4: bad signature
    // =========================================================================

    #[tokio::test]
    async fn garbage_signature_is_a_client_failure() {
        let (engine, _) = engine();
        let client = MockSqrlClient::new();
        let origin = engine.issue_login_url().await;

        let mut fields = client.envelope(
            Command::Query,
            &MockSqrlClient::server_echo_of_url(&origin.url),
            &[],
        );
        fields.insert("ids".to_string(), base64url::encode([0xC3u8; 64]));

        let (status, reply) = send(&engine, &fields).await;
        assert_eq!(status, 400);
        assert!(reply.tif.contains(Tif::COMMAND_FAILED | Tif::CLIENT_FAILURE));
    }

    // =========================================================================
    // S5: unknown nut
    // =========================================================================

    #[tokio::test]
    async fn never_issued_nut_is_rejected() {
        let (engine, _) = engine();
        let client = MockSqrlClient::new();

        let fields = client.envelope(
            Command::Query,
            &MockSqrlClient::server_echo_of_url("sqrl://example.com/sqrl?nut=neverIssued"),
            &[],
        );
        let (status, reply) = send(&engine, &fields).await;
        assert_eq!(status, 400);
        assert!(reply.ask.unwrap().contains("unknown nut"));
    }

    // =========================================================================
    // Nut single-use and ancestry
    // =========================================================================

    #[tokio::test]
    async fn a_nut_admits_exactly_one_message() {
        let (engine, _) = engine();
        let client = MockSqrlClient::new();
        let origin = engine.issue_login_url().await;
        let fields = client.envelope(
            Command::Query,
            &MockSqrlClient::server_echo_of_url(&origin.url),
            &[],
        );

        let (status, _) = send(&engine, &fields).await;
        assert_eq!(status, 200);
        let (status, reply) = send(&engine, &fields).await;
        assert_eq!(status, 400);
        assert!(reply.ask.unwrap().contains("unknown nut"));
    }

    #[tokio::test]
    async fn every_descendant_points_at_the_origin() {
        let (engine, _) = engine();
        let client = MockSqrlClient::new();
        let origin = engine.issue_login_url().await;

        let q1 = client.envelope(
            Command::Query,
            &MockSqrlClient::server_echo_of_url(&origin.url),
            &[],
        );
        let (_, reply1) = send(&engine, &q1).await;

        let q2 = client.envelope(Command::Query, &reply_echo(&reply1), &[]);
        let (_, reply2) = send(&engine, &q2).await;

        let ident = client.envelope(Command::Ident, &reply_echo(&reply2), &[]);
        let (status, _) = send(&engine, &ident).await;
        assert_eq!(status, 200);

        let registry = engine.registry();
        for nut in [&reply1.nut, &reply2.nut] {
            assert_eq!(
                registry.lookup(nut).unwrap().original_login_nut.as_deref(),
                Some(origin.nut.as_str())
            );
        }
        assert!(registry.lookup(&origin.nut).unwrap().logged_in);
    }

    // =========================================================================
    // Version rejection
    // =========================================================================

    #[tokio::test]
    async fn protocol_revision_two_is_refused() {
        let (engine, _) = engine();
        let client = MockSqrlClient::new();
        let origin = engine.issue_login_url().await;

        let mut params = ClientParameters::new(Command::Query, client.identity_key());
        params.protocol_version = 2;
        let fields = params_envelope(&client, params, &origin.url);

        let (status, reply) = send(&engine, &fields).await;
        assert_eq!(status, 400);
        assert!(reply.ask.unwrap().contains("protocol revision 1"));
    }

    fn params_envelope(
        client: &MockSqrlClient,
        params: ClientParameters,
        url: &str,
    ) -> HashMap<String, String> {
        client.sign(params, &MockSqrlClient::server_echo_of_url(url))
    }

    // =========================================================================
    // Missing-field matrix
    // =========================================================================

    /// Build an envelope whose client block omits `skip`, signing it with a
    /// key whose idk is present unless idk itself is skipped.
    fn envelope_without(client: &MockSqrlClient, url: &str, skip: &str) -> HashMap<String, String> {
        let idk = client.idk();
        let all = [("ver", "1"), ("cmd", "query"), ("idk", idk.as_str())];
        let block = nv::encode(all.iter().copied().filter(|(name, _)| *name != skip));
        let client_b64 = base64url::encode(block.as_bytes());
        let server_b64 = MockSqrlClient::server_echo_of_url(url);

        let params = ClientParameters::new(Command::Query, client.identity_key());
        let mut fields = client.sign(params, &server_b64);
        // swap in the thinned client block and re-sign over it
        let signed = format!("{}{}", client_b64, server_b64);
        fields.insert("client".to_string(), client_b64);
        fields.insert("ids".to_string(), client.sign_raw(&signed));
        fields
    }

    #[tokio::test]
    async fn omitting_each_required_field_is_a_400_with_its_own_cause() {
        let (engine, _) = engine();
        let client = MockSqrlClient::new();

        let cases: [(&str, &str); 3] = [
            ("idk", "identity key"),
            ("cmd", "unknown command"),
            ("ver", "protocol revision 1"),
        ];
        for (skip, expected) in cases {
            let origin = engine.issue_login_url().await;
            let fields = envelope_without(&client, &origin.url, skip);
            let (status, reply) = send(&engine, &fields).await;
            assert_eq!(status, 400, "omitting {skip}");
            let ask = reply.ask.unwrap();
            assert!(
                ask.contains(expected),
                "omitting {skip}: cause was {ask:?}"
            );
        }

        // and the top-level POST fields
        for missing in ["client", "server", "ids"] {
            let origin = engine.issue_login_url().await;
            let mut fields = client.envelope(
                Command::Query,
                &MockSqrlClient::server_echo_of_url(&origin.url),
                &[],
            );
            fields.remove(missing);
            let (status, reply) = send(&engine, &fields).await;
            assert_eq!(status, 400, "omitting {missing}");
            let expected = if missing == "ids" {
                "missing signature"
            } else {
                "malformed envelope"
            };
            assert!(reply.ask.unwrap().contains(expected), "omitting {missing}");
        }
    }

    // =========================================================================
    // Option flags
    // =========================================================================

    #[tokio::test]
    async fn cps_ident_carries_the_success_redirect() {
        let (engine, _) = engine();
        let client = MockSqrlClient::new();
        let origin = engine.issue_login_url().await;

        let query = client.envelope(
            Command::Query,
            &MockSqrlClient::server_echo_of_url(&origin.url),
            &[OptFlag::Cps],
        );
        let (_, reply) = send(&engine, &query).await;
        assert_eq!(reply.success_url, None, "query never redirects");

        let ident = client.envelope(Command::Ident, &reply_echo(&reply), &[OptFlag::Cps]);
        let (_, reply) = send(&engine, &ident).await;
        assert_eq!(
            reply.success_url.as_deref(),
            Some("https://example.com/loggedIn")
        );
        assert_eq!(
            reply.cancel_url.as_deref(),
            Some("https://example.com/cancelled")
        );
    }

    #[tokio::test]
    async fn secret_index_request_reaches_the_reply() {
        let store = Arc::new(MemoryIdentityStore::with_secret_index("42"));
        let engine = ProtocolEngine::new(test_config(), Arc::clone(&store));
        let client = MockSqrlClient::new();
        let origin = engine.issue_login_url().await;

        // the store has nothing to ask an unknown identity
        let q = client.envelope(
            Command::Query,
            &MockSqrlClient::server_echo_of_url(&origin.url),
            &[],
        );
        let (_, reply) = send(&engine, &q).await;
        assert_eq!(reply.secret_index, None);

        let i = client.envelope(Command::Ident, &reply_echo(&reply), &[]);
        let (_, reply) = send(&engine, &i).await;
        assert_eq!(reply.secret_index.as_deref(), Some("42"));

        // probes by the now-known identity keep carrying the request
        let q = client.envelope(Command::Query, &reply_echo(&reply), &[]);
        let (_, reply) = send(&engine, &q).await;
        assert_eq!(reply.secret_index.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn suk_is_returned_only_when_requested() {
        let (engine, _) = engine();
        let client = MockSqrlClient::new();
        let origin = engine.issue_login_url().await;

        // deposit a session unlock key on ident
        let mut params = ClientParameters::new(Command::Query, client.identity_key());
        let fields = params_envelope(&client, params.clone(), &origin.url);
        let (_, reply) = send(&engine, &fields).await;

        params.command = Command::Ident;
        params.server_unlock_key = Some("stored-suk".to_string());
        let fields = client.sign(params, &reply_echo(&reply));
        let (_, reply) = send(&engine, &fields).await;
        assert_eq!(reply.server_unlock_key, None);

        // a later query asking for it gets it back
        let fields = client.envelope(Command::Query, &reply_echo(&reply), &[OptFlag::Suk]);
        let (_, reply) = send(&engine, &fields).await;
        assert_eq!(reply.server_unlock_key.as_deref(), Some("stored-suk"));
    }

    // =========================================================================
    // Disable / enable / remove lifecycle
    // =========================================================================

    #[tokio::test]
    async fn disable_enable_remove_lifecycle() {
        let (engine, store) = engine();
        let client = MockSqrlClient::new();

        // establish the identity
        let origin = engine.issue_login_url().await;
        let q = client.envelope(
            Command::Query,
            &MockSqrlClient::server_echo_of_url(&origin.url),
            &[],
        );
        let (_, reply) = send(&engine, &q).await;
        let i = client.envelope(Command::Ident, &reply_echo(&reply), &[]);
        let (_, reply) = send(&engine, &i).await;

        // disable
        let d = client.envelope(Command::Disable, &reply_echo(&reply), &[]);
        let (status, reply) = send(&engine, &d).await;
        assert_eq!(status, 200);
        assert!(reply.tif.contains(Tif::CURRENT_ID_MATCH | Tif::ID_DISABLED));

        // a disabled identity refuses ident but stays present
        let refused = client.envelope(Command::Ident, &reply_echo(&reply), &[]);
        let (status, reply) = send(&engine, &refused).await;
        assert_eq!(status, 200, "store refusals are well-formed replies");
        assert!(reply.tif.contains(Tif::COMMAND_FAILED | Tif::ID_DISABLED));

        // enable brings it back
        let e = client.envelope(Command::Enable, &reply_echo(&reply), &[]);
        let (_, reply) = send(&engine, &e).await;
        assert_eq!(reply.tif, Tif::CURRENT_ID_MATCH);

        // remove requires disabled
        let r = client.envelope(Command::Remove, &reply_echo(&reply), &[]);
        let (_, reply) = send(&engine, &r).await;
        assert!(reply.tif.contains(Tif::COMMAND_FAILED));

        let d = client.envelope(Command::Disable, &reply_echo(&reply), &[]);
        let (_, reply) = send(&engine, &d).await;
        let r = client.envelope(Command::Remove, &reply_echo(&reply), &[]);
        let (status, reply) = send(&engine, &r).await;
        assert_eq!(status, 200);
        assert_eq!(reply.tif, Tif::CURRENT_ID_MATCH);
        assert_eq!(store.identity_count(), 0);
    }
}
