
use serde_json::json;
use test_support::{create_assignment_and_group, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn each_selected_group_gets_a_new_attempt_announced_by_one_comment() {
    let workspace = temp_dir("courseworkd-bulk-new-attempt");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (assignment_id, group_a, first_attempt_a) = create_assignment_and_group(
        &mut stdin,
        &mut reader,
        json!({
            "shortName": "assignment1",
            "firstDeadline": "2020-01-01T00:00:00Z",
            "maxPoints": 100,
            "passingGradeMinPoints": 40
        }),
    );
    let group_b = request_ok(
        &mut stdin,
        &mut reader,
        "g2",
        "groups.create",
        json!({
            "assignmentId": assignment_id,
            "candidates": [
                { "userId": "louie", "fullName": "Louie Duck", "shortName": "louie" }
            ],
            "examiners": [
                { "userId": "examiner1", "fullName": "Donald Duck", "shortName": "donald" }
            ]
        }),
    );
    let group_b = group_b["groupId"].as_str().expect("groupId").to_string();

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "deadlines.giveNewAttempt",
        json!({
            "actingUserId": "examiner1",
            "groupIds": [group_a, group_b],
            "expectedGroupCount": 2,
            "newDeadline": "2099-04-01T23:59:00Z",
            "commentText": "You have been given a new attempt."
        }),
    );
    let feedback_set_ids = result["feedbackSetIds"].as_array().expect("ids").clone();
    assert_eq!(feedback_set_ids.len(), 2);

    for (i, group_id) in result["groupIds"]
        .as_array()
        .expect("groupIds")
        .iter()
        .enumerate()
    {
        let attempts = request_ok(
            &mut stdin,
            &mut reader,
            "3",
            "groups.attempts.list",
            json!({ "groupId": group_id }),
        );
        let attempts = attempts["attempts"].as_array().expect("attempts").clone();
        assert_eq!(attempts.len(), 2);
        let new_attempt = &attempts[1];
        assert_eq!(new_attempt["id"], feedback_set_ids[i]);
        assert_eq!(new_attempt["feedbacksetType"], "new_attempt");
        assert_eq!(new_attempt["deadlineDatetime"], "2099-04-01T23:59:00.000000Z");
        assert_eq!(new_attempt["createdBy"], "examiner1");

        // The attempt exists before its announcement becomes visible.
        let comments = request_ok(
            &mut stdin,
            &mut reader,
            "4",
            "comments.list",
            json!({
                "feedbackSetId": new_attempt["id"],
                "viewerUserId": "dewey",
                "viewerRole": "student"
            }),
        );
        let comments = comments["comments"].as_array().expect("comments").clone();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0]["text"], "You have been given a new attempt.");
        let created = new_attempt["createdDatetime"].as_str().expect("created");
        let published = comments[0]["publishedDatetime"].as_str().expect("published");
        assert!(published > created);
    }

    // The announcement attaches to the new attempt, not the first one.
    let comments = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "comments.list",
        json!({
            "feedbackSetId": first_attempt_a,
            "viewerUserId": "dewey",
            "viewerRole": "student"
        }),
    );
    assert!(comments["comments"].as_array().expect("comments").is_empty());
}

#[test]
fn acting_user_must_be_examiner_on_every_selected_group() {
    let workspace = temp_dir("courseworkd-bulk-new-attempt-auth");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (_, group_a, _) = create_assignment_and_group(
        &mut stdin,
        &mut reader,
        json!({ "shortName": "assignment1", "firstDeadline": "2020-01-01T00:00:00Z" }),
    );

    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "deadlines.giveNewAttempt",
        json!({
            "actingUserId": "someone_else",
            "groupIds": [group_a.clone()],
            "expectedGroupCount": 1,
            "newDeadline": "2099-04-01T23:59:00Z",
            "commentText": "You have been given a new attempt."
        }),
    );
    assert_eq!(error["code"], "unauthorized_selection");

    let attempts = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "groups.attempts.list",
        json!({ "groupId": group_a }),
    );
    assert_eq!(attempts["attempts"].as_array().expect("attempts").len(), 1);
}
