//! Table rendering for terminal output

use rbzk::constants::privilege;
use rbzk::{Attendance, DeviceInfo, DeviceSizes, FingerTemplate, User};

pub fn privilege_name(level: u8) -> String {
    match level {
        privilege::DEFAULT => "User".to_string(),
        privilege::ENROLLER => "Enroller".to_string(),
        privilege::MANAGER => "Manager".to_string(),
        privilege::ADMIN => "Admin".to_string(),
        other => other.to_string(),
    }
}

pub fn print_users(users: &[User]) {
    if users.is_empty() {
        println!("No users on the device.");
        return;
    }

    println!(
        "{:<6} {:<12} {:<24} {:<10} {:<8} {:<10}",
        "UID", "User ID", "Name", "Privilege", "Group", "Card"
    );
    println!("{}", "-".repeat(74));

    for user in users {
        println!(
            "{:<6} {:<12} {:<24} {:<10} {:<8} {:<10}",
            user.uid,
            user.user_id,
            user.name,
            privilege_name(user.privilege),
            user.group_id,
            user.card
        );
    }

    println!("\n{} user(s)", users.len());
}

pub fn print_logs(logs: &[Attendance]) {
    if logs.is_empty() {
        println!("No attendance records.");
        return;
    }

    println!(
        "{:<6} {:<12} {:<20} {:<8} {:<6}",
        "UID", "User ID", "Time", "Status", "Punch"
    );
    println!("{}", "-".repeat(56));

    for log in logs {
        println!(
            "{:<6} {:<12} {:<20} {:<8} {:<6}",
            log.uid,
            log.user_id,
            log.timestamp.format("%Y-%m-%d %H:%M:%S"),
            log.status,
            punch_name(log.punch)
        );
    }

    println!("\n{} record(s)", logs.len());
}

fn punch_name(punch: u8) -> String {
    match punch {
        0 => "in".to_string(),
        1 => "out".to_string(),
        other => other.to_string(),
    }
}

pub fn print_templates(templates: &[FingerTemplate]) {
    if templates.is_empty() {
        println!("No fingerprint templates.");
        return;
    }

    println!("{:<6} {:<8} {:<6} {:<8}", "UID", "Finger", "Valid", "Bytes");
    println!("{}", "-".repeat(30));

    for template in templates {
        println!(
            "{:<6} {:<8} {:<6} {:<8}",
            template.uid,
            template.finger_id,
            template.valid,
            template.template.len()
        );
    }

    println!("\n{} template(s)", templates.len());
}

pub fn print_info(info: &DeviceInfo, sizes: &DeviceSizes) {
    let rows = [
        ("Firmware", &info.firmware_version),
        ("Serial number", &info.serial_number),
        ("Platform", &info.platform),
        ("Device name", &info.device_name),
        ("MAC", &info.mac_address),
        ("Face version", &info.face_version),
        ("Finger version", &info.fingerprint_version),
        ("ExtendFmt", &info.extend_fmt),
    ];

    for (label, value) in rows {
        if !value.is_empty() {
            println!("{label:<16} {value}");
        }
    }

    println!();
    println!("{:<16} {}/{}", "Users", sizes.users, sizes.users_cap);
    println!("{:<16} {}/{}", "Fingers", sizes.fingers, sizes.fingers_cap);
    println!("{:<16} {}/{}", "Records", sizes.records, sizes.records_cap);
    if sizes.cards > 0 {
        println!("{:<16} {}", "Cards", sizes.cards);
    }
    if sizes.faces_cap > 0 {
        println!("{:<16} {}/{}", "Faces", sizes.faces, sizes.faces_cap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_names() {
        assert_eq!(privilege_name(0), "User");
        assert_eq!(privilege_name(2), "Enroller");
        assert_eq!(privilege_name(6), "Manager");
        assert_eq!(privilege_name(14), "Admin");
        assert_eq!(privilege_name(3), "3");
    }

    #[test]
    fn test_punch_names() {
        assert_eq!(punch_name(0), "in");
        assert_eq!(punch_name(1), "out");
        assert_eq!(punch_name(5), "5");
    }
}
