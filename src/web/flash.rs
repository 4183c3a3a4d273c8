/// Compose a flash message HTML snippet for known status or error codes.
pub fn compose_flash_message(status: Option<&str>, error: Option<&str>) -> String {
    if let Some(status) = status {
        let message = match status {
            "registered" => "Registration complete. An administrator must activate your account before you can sign in.",
            "logged_out" => "You have been logged out.",
            "uploaded" => "Upload complete.",
            "merged" => "Merged PDF is ready to download.",
            "converted" => "Image PDF is ready to download.",
            "cleared" => "Your folder has been cleared.",
            "user_activated" => "User activated.",
            "user_deactivated" => "User deactivated.",
            "user_promoted" => "User promoted to administrator.",
            "user_demoted" => "Administrator rights removed.",
            "user_deleted" => "User deleted.",
            _ => "",
        };

        if !message.is_empty() {
            return format!(r#"<div class="flash success">{message}</div>"#);
        }
    }

    if let Some(error) = error {
        let message = match error {
            "invalid_credentials" => "Invalid username or password.",
            "inactive" => "Your account is awaiting activation by an administrator.",
            "duplicate" => "That username already exists. Please choose a different one.",
            "username_length" => "Usernames must be between 4 and 20 characters.",
            "username_chars" => "Usernames may only contain letters, digits, '.', '_' and '-'.",
            "password_length" => "Passwords must be between 8 and 20 characters.",
            "hash_failed" => "Could not process the password, please try again.",
            "no_file" => "Choose at least one file to upload.",
            "upload_rejected" => "Upload rejected. Check the file type and try again.",
            "no_pdfs" => "Upload at least one PDF before merging.",
            "no_images" => "Upload at least one JPEG or PNG image before converting.",
            "order_stale" => "Your file order refers to files that are gone. Reorder the list and try again.",
            "merge_failed" => "Merging failed. One of the files may be damaged.",
            "convert_failed" => "Conversion failed. Only baseline JPEG and non-transparent PNG images are supported.",
            "clear_failed" => "Could not clear your folder.",
            "self_action" => "You cannot change or delete your own account here.",
            "user_missing" => "That user no longer exists.",
            _ => "Something went wrong, please check the logs.",
        };

        return format!(r#"<div class="flash error">{message}</div>"#);
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_takes_precedence() {
        let html = compose_flash_message(Some("merged"), Some("merge_failed"));
        assert!(html.contains("flash success"));
    }

    #[test]
    fn unknown_status_falls_through_to_error() {
        let html = compose_flash_message(Some("bogus"), Some("no_pdfs"));
        assert!(html.contains("flash error"));
        assert!(html.contains("at least one PDF"));
    }

    #[test]
    fn nothing_renders_empty() {
        assert!(compose_flash_message(None, None).is_empty());
    }
}
