
use serde_json::json;
use test_support::{create_assignment_and_group, request_ok, spawn_sidecar, temp_dir};

fn list_texts(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    feedback_set_id: &str,
    viewer_user_id: &str,
    viewer_role: &str,
) -> Vec<String> {
    let result = request_ok(
        stdin,
        reader,
        "l",
        "comments.list",
        json!({
            "feedbackSetId": feedback_set_id,
            "viewerUserId": viewer_user_id,
            "viewerRole": viewer_role
        }),
    );
    result["comments"]
        .as_array()
        .expect("comments")
        .iter()
        .map(|c| c["text"].as_str().expect("text").to_string())
        .collect()
}

#[test]
fn grading_drafts_stay_hidden_until_publish_then_appear_in_creation_order() {
    let workspace = temp_dir("courseworkd-comment-visibility");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (_, _, feedback_set_id) = create_assignment_and_group(
        &mut stdin,
        &mut reader,
        json!({
            "shortName": "assignment1",
            "firstDeadline": "2020-01-01T00:00:00Z",
            "maxPoints": 100,
            "passingGradeMinPoints": 40
        }),
    );

    for (i, text) in ["first point", "second point", "third point"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{i}"),
            "comments.add",
            json!({
                "feedbackSetId": feedback_set_id,
                "userId": "examiner1",
                "userRole": "examiner",
                "text": text,
                "visibility": "visible_to_everyone",
                "partOfGrading": true
            }),
        );
    }

    // Drafts: invisible to the student, visible to their author.
    assert!(list_texts(&mut stdin, &mut reader, &feedback_set_id, "dewey", "student").is_empty());
    assert_eq!(
        list_texts(&mut stdin, &mut reader, &feedback_set_id, "examiner1", "examiner").len(),
        3
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "p",
        "feedbackset.publish",
        json!({ "feedbackSetId": feedback_set_id, "publishedBy": "examiner1", "points": 60 }),
    );

    // After publish the student sees the drafts in the order they were
    // written.
    assert_eq!(
        list_texts(&mut stdin, &mut reader, &feedback_set_id, "dewey", "student"),
        vec!["first point", "second point", "third point"]
    );
}

#[test]
fn staff_only_comments_are_hidden_from_students() {
    let workspace = temp_dir("courseworkd-comment-staff-only");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (_, _, feedback_set_id) = create_assignment_and_group(
        &mut stdin,
        &mut reader,
        json!({ "shortName": "assignment1" }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "comments.add",
        json!({
            "feedbackSetId": feedback_set_id,
            "userId": "examiner1",
            "userRole": "examiner",
            "text": "internal note",
            "visibility": "visible_to_examiner_and_admins"
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "comments.add",
        json!({
            "feedbackSetId": feedback_set_id,
            "userId": "dewey",
            "userRole": "student",
            "text": "my delivery note",
            "visibility": "visible_to_everyone"
        }),
    );

    assert_eq!(
        list_texts(&mut stdin, &mut reader, &feedback_set_id, "dewey", "student"),
        vec!["my delivery note"]
    );
    assert_eq!(
        list_texts(&mut stdin, &mut reader, &feedback_set_id, "examiner1", "examiner"),
        vec!["internal note", "my delivery note"]
    );
    assert_eq!(
        list_texts(&mut stdin, &mut reader, &feedback_set_id, "admin", "periodadmin"),
        vec!["internal note", "my delivery note"]
    );
}
