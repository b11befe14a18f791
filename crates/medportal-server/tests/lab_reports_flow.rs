mod common;

use common::{TestServer, start_server, token};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

fn report_form(report_id: &str, patient: &str, mime: &str) -> Form {
    let part = Part::bytes(b"%PDF-1.4 fake".to_vec())
        .file_name("report.pdf")
        .mime_str(mime)
        .unwrap();
    Form::new()
        .text("reportID", report_id.to_string())
        .text("doctorName", "Dr. House")
        .text("comment", "Initial read")
        .text("patientId", patient.to_string())
        .part("report", part)
}

async fn upload(server: &TestServer, token: &str, form: Form) -> reqwest::Response {
    server
        .client
        .post(server.url("/api/reports/upload"))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn upload_then_admin_delete_unlinks_the_patient() {
    let server = start_server().await;
    let doctor = token("doc_d", "doctor");
    let admin = token("admin_a", "admin");
    let patient = token("patient_u", "patient");
    let user_id = server.save_user(&patient, json!({"firstName": "Una"})).await;

    let resp = upload(&server, &doctor, report_form("R-1", "patient_u", "application/pdf")).await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Lab report uploaded successfully");
    let report = &body["labReport"];
    let report_id = report["_id"].as_str().unwrap().to_string();
    assert_eq!(report["userId"], user_id);
    assert_eq!(report["clerkUserId"], "patient_u");
    assert_eq!(report["doctorComments"].as_array().unwrap().len(), 1);

    // The stored file is served back under /uploads
    let file_url = report["fileUrl"].as_str().unwrap();
    let resp = server.client.get(server.url(&format!("/{file_url}"))).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = server
        .client
        .get(server.url("/api/reports/user"))
        .bearer_auth(&patient)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let list: Value = resp.json().await.unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);

    let resp = server
        .client
        .delete(server.url(&format!("/api/reports/{report_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Lab report deleted successfully");

    let resp = server
        .client
        .get(server.url("/api/reports/user"))
        .bearer_auth(&patient)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let user = server
        .state
        .users
        .find_by_identity("patient_u")
        .await
        .unwrap()
        .unwrap();
    assert!(!user.data.lab_reports.contains(&report_id));

    server.stop().await;
}

#[tokio::test]
async fn rejects_disallowed_file_types_without_creating_a_report() {
    let server = start_server().await;
    let doctor = token("doc_d", "doctor");
    let admin = token("admin_a", "admin");
    let patient = token("patient_u", "patient");
    server.save_user(&patient, json!({})).await;

    let resp = upload(&server, &doctor, report_form("R-2", "patient_u", "text/plain")).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Only PDF, JPG, and PNG files are allowed");

    let resp = server
        .client
        .get(server.url("/api/reports/all-reports"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn upload_is_doctor_only_and_needs_a_known_patient() {
    let server = start_server().await;
    let doctor = token("doc_d", "doctor");
    let patient = token("patient_u", "patient");

    let resp = upload(&server, &patient, report_form("R-3", "patient_u", "application/pdf")).await;
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Forbidden: Doctors only");

    let resp = upload(&server, &doctor, report_form("R-3", "patient_u", "application/pdf")).await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "User not found");

    // Missing fields and file
    let resp = upload(&server, &doctor, Form::new().text("reportID", "R-4")).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Validation failed");
    assert!(body["errors"].as_array().unwrap().len() >= 3);

    server.stop().await;
}

#[tokio::test]
async fn comments_append_in_order_and_reads_are_owner_gated() {
    let server = start_server().await;
    let doctor = token("doc_d", "doctor");
    let other_doctor = token("doc_e", "doctor");
    let patient = token("patient_u", "patient");
    let stranger = token("patient_v", "patient");
    let admin = token("admin_a", "admin");
    server.save_user(&patient, json!({})).await;

    let resp = upload(&server, &doctor, report_form("R-5", "patient_u", "image/png")).await;
    let body: Value = resp.json().await.unwrap();
    let id = body["labReport"]["_id"].as_str().unwrap().to_string();

    // Any doctor may comment
    for (who, text) in [(&doctor, "first"), (&other_doctor, "second")] {
        let resp = server
            .client
            .post(server.url(&format!("/api/reports/{id}/comment")))
            .bearer_auth(who)
            .json(&json!({"doctorName": "Dr. X", "comment": text}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = server
        .client
        .get(server.url(&format!("/api/reports/{id}")))
        .bearer_auth(&patient)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let report: Value = resp.json().await.unwrap();
    let comments: Vec<&str> = report["doctorComments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["comment"].as_str().unwrap())
        .collect();
    assert_eq!(comments, ["Initial read", "first", "second"]);

    let resp = server
        .client
        .get(server.url(&format!("/api/reports/{id}")))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = server
        .client
        .get(server.url(&format!("/api/reports/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = server
        .client
        .post(server.url("/api/reports/000000000000000000000000/comment"))
        .bearer_auth(&doctor)
        .json(&json!({"doctorName": "Dr. X", "comment": "lost"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn update_changes_fields_and_admin_list_is_populated() {
    let server = start_server().await;
    let doctor = token("doc_d", "doctor");
    let patient = token("patient_u", "patient");
    let admin = token("admin_a", "admin");
    server
        .save_user(&patient, json!({"firstName": "Una", "lastName": "Patient"}))
        .await;

    let resp = upload(&server, &doctor, report_form("R-6", "patient_u", "application/pdf")).await;
    let body: Value = resp.json().await.unwrap();
    let id = body["labReport"]["_id"].as_str().unwrap().to_string();

    let resp = server
        .client
        .put(server.url(&format!("/api/reports/{id}")))
        .bearer_auth(&patient)
        .json(&json!({"reportID": "R-6b"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = server
        .client
        .put(server.url(&format!("/api/reports/{id}")))
        .bearer_auth(&doctor)
        .json(&json!({"reportID": "R-6b", "doctorName": "Dr. House", "comment": "Follow-up"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Lab report updated successfully");
    assert_eq!(body["updatedReport"]["reportID"], "R-6b");
    assert_eq!(body["updatedReport"]["doctorComments"].as_array().unwrap().len(), 2);

    let resp = server
        .client
        .get(server.url("/api/reports/all-reports"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let all: Value = resp.json().await.unwrap();
    let populated = &all[0]["userId"];
    assert_eq!(populated["firstName"], "Una");
    assert_eq!(populated["clerkUserId"], "patient_u");

    // Only admins may delete
    let resp = server
        .client
        .delete(server.url(&format!("/api/reports/{id}")))
        .bearer_auth(&doctor)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    server.stop().await;
}
