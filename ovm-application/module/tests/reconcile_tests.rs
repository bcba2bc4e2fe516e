//! 目标状态协调测试

use std::cell::Cell;
use std::sync::Arc;

use ovm_module::{reconcile, run, ModuleParams};
use ovm_restapi::mock::{job_json, MockTransport};
use ovm_restapi::{OvmClient, OvmError, PollPolicy};
use reqwest::Method;
use serde_json::{json, Value};

fn params(extra: Value) -> ModuleParams {
    let mut base = json!({
        "name": "host01",
        "ovm_user": "admin",
        "ovm_pass": "password",
        "server_pool": "Pool1",
        "repository": "Repo1"
    });
    for (k, v) in extra.as_object().unwrap() {
        base[k] = v.clone();
    }
    serde_json::from_value(base).unwrap()
}

fn client(mock: &Arc<MockTransport>) -> OvmClient {
    OvmClient::new(mock.clone()).with_poll_policy(PollPolicy {
        interval_ms: 0,
        ..Default::default()
    })
}

/// 作业先返回 RUNNING 再以给定状态结束
fn job_route(mock: &MockTransport, method: Method, path: &str, job_id: &str, terminal: &str) {
    mock.on(method, path, job_json(job_id, "RUNNING", false));
    mock.on(Method::GET, &format!("Job/{}", job_id), job_json(job_id, "RUNNING", false));
    mock.on(Method::GET, &format!("Job/{}", job_id), job_json(job_id, terminal, true));
}

fn existing_vm(mock: &MockTransport) {
    mock.on(
        Method::GET,
        "Vm/id",
        json!([
            { "value": "vm-0", "name": "other" },
            { "value": "vm-1", "name": "host01" }
        ]),
    );
}

fn missing_vm_then_created(mock: &MockTransport) {
    mock.on(Method::GET, "Vm/id", json!([]));
    mock.on(Method::GET, "Vm/id", json!([{ "value": "vm-new", "name": "host01" }]));
}

fn provisioning_lookups(mock: &MockTransport) {
    mock.on(Method::GET, "Repository/id", json!([{ "value": "repo-1", "name": "Repo1" }]));
    mock.on(Method::GET, "ServerPool/id", json!([{ "value": "pool-1", "name": "Pool1" }]));
    mock.on(
        Method::GET,
        "Network/id",
        json!([
            { "value": "net-1", "name": "10.20.20.0" },
            { "value": "net-2", "name": "10.20.30.0" }
        ]),
    );
    mock.on(
        Method::GET,
        "VirtualDisk/id",
        json!([
            { "value": "disk-1", "name": "host01_root" },
            { "value": "disk-2", "name": "host01_data" }
        ]),
    );
}

#[tokio::test]
async fn test_invalid_memory_fails_before_network() {
    for extra in [
        json!({ "memory": 4097 }),
        json!({ "memory": 4096, "memory_limit": 2048 }),
        json!({ "memory": 4096, "memory_limit": 6000 }),
    ] {
        let mock = Arc::new(MockTransport::new());
        let connected = Cell::new(false);

        let result = run(&params(extra), |_| {
            connected.set(true);
            Ok(client(&mock))
        })
        .await
        .unwrap();

        assert!(result.failed);
        assert!(!result.changed);
        assert!(!connected.get());
        assert!(mock.calls().is_empty());
    }
}

#[tokio::test]
async fn test_validation_messages() {
    let mock = Arc::new(MockTransport::new());

    let result = run(&params(json!({ "memory": 4097 })), |_| Ok(client(&mock)))
        .await
        .unwrap();
    assert_eq!(result.msg.as_deref(), Some("memory must be a multitude of 1024"));

    let result = run(
        &params(json!({ "memory": 4096, "memory_limit": 2048 })),
        |_| Ok(client(&mock)),
    )
    .await
    .unwrap();
    assert_eq!(result.msg.as_deref(), Some("memory_limit < memory"));
}

#[tokio::test]
async fn test_absent_deletes_existing_vm() {
    let mock = Arc::new(MockTransport::new());
    existing_vm(&mock);
    job_route(&mock, Method::DELETE, "Vm/vm-1", "job-del", "SUCCESS");

    let p = params(json!({ "state": "absent" }));
    let result = run(&p, |_| Ok(client(&mock))).await.unwrap();

    assert!(result.changed);
    assert!(!result.failed);
    assert_eq!(mock.count(&Method::DELETE, "Vm/vm-1"), 1);
    assert_eq!(mock.request_log(), vec!["GET Vm/id", "DELETE Vm/vm-1"]);
    assert_eq!(mock.count(&Method::GET, "Job/job-del"), 2);
}

#[tokio::test]
async fn test_absent_delete_job_failure() {
    let mock = Arc::new(MockTransport::new());
    existing_vm(&mock);
    mock.on(Method::DELETE, "Vm/vm-1", job_json("job-del", "RUNNING", false));
    mock.on(
        Method::GET,
        "Job/job-del",
        json!({
            "id": { "value": "job-del" },
            "jobRunState": "FAILURE",
            "summaryDone": true,
            "error": "Vm is running"
        }),
    );

    let p = params(json!({ "state": "absent" }));
    let result = run(&p, |_| Ok(client(&mock))).await.unwrap();

    assert!(!result.changed);
    assert!(result.failed);
    assert_eq!(
        result.msg.as_deref(),
        Some("Job job-del failed with: Vm is running.")
    );
    assert_eq!(mock.count(&Method::DELETE, "Vm/vm-1"), 1);
}

#[tokio::test]
async fn test_present_existing_vm_is_noop() {
    let mock = Arc::new(MockTransport::new());
    existing_vm(&mock);

    let p = params(json!({ "state": "present" }));
    let result = run(&p, |_| Ok(client(&mock))).await.unwrap();

    assert!(!result.changed);
    assert!(!result.failed);
    assert_eq!(mock.request_log(), vec!["GET Vm/id"]);
}

#[tokio::test]
async fn test_power_states_on_existing_vm() {
    for state in ["start", "stop", "restart"] {
        let mock = Arc::new(MockTransport::new());
        existing_vm(&mock);
        let path = format!("Vm/vm-1/{}", state);
        job_route(&mock, Method::PUT, &path, "job-power", "SUCCESS");

        let p = params(json!({ "state": state }));
        let result = run(&p, |_| Ok(client(&mock))).await.unwrap();

        assert!(result.changed, "state {}", state);
        assert_eq!(mock.count(&Method::PUT, &path), 1);
    }
}

#[tokio::test]
async fn test_missing_vm_non_present_states_are_noop() {
    for state in ["absent", "start", "stop", "restart"] {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::GET, "Vm/id", json!([]));

        let p = params(json!({ "state": state }));
        let result = run(&p, |_| Ok(client(&mock))).await.unwrap();

        assert!(!result.changed);
        assert!(!result.failed);
        assert_eq!(mock.request_log(), vec!["GET Vm/id"]);
    }
}

#[tokio::test]
async fn test_present_provisions_vm_nics_disks_and_starts() {
    let mock = Arc::new(MockTransport::new());
    missing_vm_then_created(&mock);
    provisioning_lookups(&mock);
    job_route(&mock, Method::POST, "Vm", "job-create", "SUCCESS");
    job_route(&mock, Method::POST, "Vm/vm-new/VirtualNic", "job-nic", "SUCCESS");
    job_route(&mock, Method::POST, "Vm/vm-new/VmDiskMapping", "job-disk", "SUCCESS");
    mock.on(Method::PUT, "Vm/vm-new/start", job_json("job-start", "RUNNING", false));
    mock.on(
        Method::GET,
        "Job/job-start",
        json!({
            "id": { "value": "job-start" },
            "jobRunState": "SUCCESS",
            "summaryDone": true,
            "resultId": { "value": "vm-new", "name": "host01" }
        }),
    );

    let p = params(json!({
        "state": "present",
        "memory": 8192,
        "cpu_count": 4,
        "boot_order": ["PXE", "DISK"],
        "domain_type": "XEN_PVM",
        "virtual_nics": [
            { "network": "10.20.20.0", "mac_address": "00:21:f6:00:00:01" },
            { "network": "10.20.30.0", "mac_address": "00:21:f6:00:00:02" }
        ],
        "disk_mappings": [
            { "slot": 0, "virtual_disk": "host01_root" },
            { "slot": 1, "virtual_disk": "host01_data" },
            { "slot": 2, "virtual_disk": "host01_root" }
        ]
    }));
    let result = run(&p, |_| Ok(client(&mock))).await.unwrap();

    assert!(result.changed);
    assert!(!result.failed);
    assert_eq!(result.result_id.unwrap().value, "vm-new");

    assert_eq!(mock.count(&Method::POST, "Vm"), 1);
    assert_eq!(mock.count(&Method::POST, "Vm/vm-new/VirtualNic"), 2);
    assert_eq!(mock.count(&Method::POST, "Vm/vm-new/VmDiskMapping"), 3);
    assert_eq!(mock.count(&Method::PUT, "Vm/vm-new/start"), 1);

    // 创建后才添加网卡和磁盘，最后启动
    let mutations: Vec<String> = mock
        .request_log()
        .into_iter()
        .filter(|r| !r.starts_with("GET"))
        .collect();
    assert_eq!(
        mutations,
        vec![
            "POST Vm",
            "POST Vm/vm-new/VirtualNic",
            "POST Vm/vm-new/VirtualNic",
            "POST Vm/vm-new/VmDiskMapping",
            "POST Vm/vm-new/VmDiskMapping",
            "POST Vm/vm-new/VmDiskMapping",
            "PUT Vm/vm-new/start",
        ]
    );

    // 每种列表在一次调用内最多拉取两次（创建前后各一次）
    assert_eq!(mock.count(&Method::GET, "Vm/id"), 2);
    assert_eq!(mock.count(&Method::GET, "Network/id"), 1);
    assert_eq!(mock.count(&Method::GET, "VirtualDisk/id"), 1);

    let create = mock.last_call(&Method::POST, "Vm").unwrap().body.unwrap();
    assert_eq!(create["name"], "host01");
    assert_eq!(create["memory"], 8192);
    assert_eq!(create["memoryLimit"], 8192);
    assert_eq!(create["cpuCount"], 4);
    assert_eq!(create["cpuCountLimit"], 4);
    assert_eq!(create["vmDomainType"], "XEN_PVM");
    assert_eq!(create["repositoryId"]["value"], "repo-1");
    assert_eq!(create["serverPoolId"]["value"], "pool-1");
    assert_eq!(create["bootOrder"], json!(["PXE", "DISK"]));

    let nic = mock
        .last_call(&Method::POST, "Vm/vm-new/VirtualNic")
        .unwrap()
        .body
        .unwrap();
    assert_eq!(nic["macAddress"], "00:21:f6:00:00:02");
    assert_eq!(nic["networkId"]["value"], "net-2");
}

#[tokio::test]
async fn test_present_without_attachments_creates_and_starts() {
    let mock = Arc::new(MockTransport::new());
    missing_vm_then_created(&mock);
    provisioning_lookups(&mock);
    job_route(&mock, Method::POST, "Vm", "job-create", "SUCCESS");
    job_route(&mock, Method::PUT, "Vm/vm-new/start", "job-start", "SUCCESS");

    let result = run(&params(json!({})), |_| Ok(client(&mock))).await.unwrap();

    assert!(result.changed);
    let mutations: Vec<String> = mock
        .request_log()
        .into_iter()
        .filter(|r| !r.starts_with("GET"))
        .collect();
    assert_eq!(mutations, vec!["POST Vm", "PUT Vm/vm-new/start"]);
}

#[tokio::test]
async fn test_create_failure_stops_provisioning() {
    let mock = Arc::new(MockTransport::new());
    missing_vm_then_created(&mock);
    provisioning_lookups(&mock);
    job_route(&mock, Method::POST, "Vm", "job-create", "FAILURE");

    let p = params(json!({
        "virtual_nics": [{ "network": "10.20.20.0", "mac_address": "00:21:f6:00:00:01" }]
    }));
    let result = run(&p, |_| Ok(client(&mock))).await.unwrap();

    assert!(result.failed);
    assert!(!result.changed);
    assert_eq!(mock.count(&Method::POST, "Vm/vm-new/VirtualNic"), 0);
    assert_eq!(mock.count(&Method::PUT, "Vm/vm-new/start"), 0);
}

#[tokio::test]
async fn test_missing_network_leaves_created_vm() {
    let mock = Arc::new(MockTransport::new());
    missing_vm_then_created(&mock);
    provisioning_lookups(&mock);
    job_route(&mock, Method::POST, "Vm", "job-create", "SUCCESS");

    let p = params(json!({
        "virtual_nics": [{ "network": "192.168.99.0", "mac_address": "00:21:f6:00:00:01" }],
        "disk_mappings": [{ "slot": 0, "virtual_disk": "host01_root" }]
    }));
    let result = run(&p, |_| Ok(client(&mock))).await.unwrap();

    assert!(result.failed);
    assert!(result.changed);
    assert_eq!(
        result.msg.as_deref(),
        Some("Could not find a network named 192.168.99.0.")
    );
    assert_eq!(mock.count(&Method::POST, "Vm"), 1);
    assert_eq!(mock.count(&Method::DELETE, "Vm/vm-new"), 0);
    assert_eq!(mock.count(&Method::POST, "Vm/vm-new/VmDiskMapping"), 0);
    assert_eq!(mock.count(&Method::PUT, "Vm/vm-new/start"), 0);
}

#[tokio::test]
async fn test_failed_steps_after_create_report_changed() {
    // 磁盘映射作业失败
    let mock = Arc::new(MockTransport::new());
    missing_vm_then_created(&mock);
    provisioning_lookups(&mock);
    job_route(&mock, Method::POST, "Vm", "job-create", "SUCCESS");
    job_route(&mock, Method::POST, "Vm/vm-new/VmDiskMapping", "job-disk", "FAILURE");

    let p = params(json!({
        "disk_mappings": [{ "slot": 0, "virtual_disk": "host01_root" }]
    }));
    let result = run(&p, |_| Ok(client(&mock))).await.unwrap();

    assert!(result.failed);
    assert!(result.changed);
    assert_eq!(mock.count(&Method::PUT, "Vm/vm-new/start"), 0);

    // 启动作业失败
    let mock = Arc::new(MockTransport::new());
    missing_vm_then_created(&mock);
    provisioning_lookups(&mock);
    job_route(&mock, Method::POST, "Vm", "job-create", "SUCCESS");
    job_route(&mock, Method::PUT, "Vm/vm-new/start", "job-start", "FAILURE");

    let result = run(&params(json!({})), |_| Ok(client(&mock))).await.unwrap();

    assert!(result.failed);
    assert!(result.changed);
}

#[tokio::test]
async fn test_check_mode_skips_without_network() {
    for state in ["present", "absent", "start", "stop", "restart"] {
        let mock = Arc::new(MockTransport::new());
        existing_vm(&mock);
        job_route(&mock, Method::DELETE, "Vm/vm-1", "job-del", "SUCCESS");
        let connected = Cell::new(false);

        let p = params(json!({ "state": state, "_ansible_check_mode": true }));
        let result = run(&p, |_| {
            connected.set(true);
            Ok(client(&mock))
        })
        .await
        .unwrap();

        assert!(result.skipped);
        assert!(!result.changed);
        assert!(!result.failed);
        assert_eq!(
            result.msg.as_deref(),
            Some("remote module (ovm_vm) does not support check mode")
        );
        assert!(!connected.get());
        assert!(mock.calls().is_empty());
    }

    // 检查模式先于参数校验
    let mock = Arc::new(MockTransport::new());
    let p = params(json!({ "memory": 4097, "_ansible_check_mode": true }));
    let result = run(&p, |_| Ok(client(&mock))).await.unwrap();
    assert!(result.skipped);
    assert!(!result.failed);
}

#[tokio::test]
async fn test_unresolved_repository_sent_as_null() {
    let mock = Arc::new(MockTransport::new());
    missing_vm_then_created(&mock);
    mock.on(Method::GET, "Repository/id", json!([]));
    mock.on(Method::GET, "ServerPool/id", json!([{ "value": "pool-1", "name": "Pool1" }]));
    job_route(&mock, Method::POST, "Vm", "job-create", "FAILURE");

    let result = run(&params(json!({})), |_| Ok(client(&mock))).await.unwrap();

    assert!(result.failed);
    let create = mock.last_call(&Method::POST, "Vm").unwrap().body.unwrap();
    assert!(create["repositoryId"].is_null());
}

#[tokio::test]
async fn test_transport_error_propagates() {
    let mock = Arc::new(MockTransport::new());
    mock.on_error(Method::GET, "Vm/id", 401, "Unauthorized");

    let p = params(json!({ "state": "absent" }));
    let limits = p.validate().unwrap();
    let client = client(&mock);

    let err = reconcile(&client, &p, &limits).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OvmError>(),
        Some(OvmError::ApiError(401, _))
    ));
}
