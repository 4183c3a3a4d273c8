use crate::web::{
    storage::{FileKind, StagedFile},
    templates::escape_html,
};

/// Shared CSS for the upload form and the sortable file list.
pub const SORTABLE_LIST_STYLES: &str = r#"
.wb-upload { display: flex; flex-direction: column; gap: 0.75rem; }
.wb-upload input[type="file"] { padding: 1.5rem; border: 2px dashed #cbd5f5; border-radius: 12px; background: #f8fafc; }
.wb-sortable { list-style: none; margin: 0; padding: 0; display: flex; flex-direction: column; gap: 0.5rem; }
.wb-sortable li { display: flex; justify-content: space-between; align-items: center; gap: 0.75rem; padding: 0.65rem 0.9rem; border: 1px solid #e2e8f0; border-radius: 8px; background: #ffffff; cursor: grab; }
.wb-sortable li.dragging { opacity: 0.4; }
.wb-sortable li.inactive { color: #94a3b8; }
.wb-name { flex: 1; min-width: 0; word-break: break-all; }
.wb-tag { font-size: 0.8rem; font-weight: 600; padding: 0.15rem 0.6rem; border-radius: 999px; background: #e0f2fe; color: #1d4ed8; }
.wb-order-status { min-height: 1.5rem; font-size: 0.9rem; color: #475569; }
"#;

/// Drag-and-drop reordering. After every drop the complete list is posted to
/// `/sorted_list`, which replaces the stored order.
pub const SORTABLE_LIST_SCRIPT: &str = r#"<script>
(function() {
    const list = document.getElementById('sortable');
    const statusBox = document.getElementById('order-status');
    if (!list) {
        return;
    }
    let dragged = null;

    list.addEventListener('dragstart', (event) => {
        dragged = event.target.closest('li');
        if (dragged) {
            dragged.classList.add('dragging');
        }
    });

    list.addEventListener('dragover', (event) => {
        event.preventDefault();
        if (!dragged) {
            return;
        }
        const after = elementAfter(event.clientY);
        if (after == null) {
            list.appendChild(dragged);
        } else if (after !== dragged) {
            list.insertBefore(dragged, after);
        }
    });

    list.addEventListener('dragend', () => {
        if (!dragged) {
            return;
        }
        dragged.classList.remove('dragging');
        dragged = null;
        sendOrder();
    });

    function elementAfter(y) {
        const candidates = [...list.querySelectorAll('li:not(.dragging)')];
        let closest = { offset: Number.NEGATIVE_INFINITY, element: null };
        for (const child of candidates) {
            const box = child.getBoundingClientRect();
            const offset = y - box.top - box.height / 2;
            if (offset < 0 && offset > closest.offset) {
                closest = { offset, element: child };
            }
        }
        return closest.element;
    }

    async function sendOrder() {
        const order = [...list.querySelectorAll('li')].map((item) => item.dataset.filename);
        try {
            const response = await fetch('/sorted_list', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify(order),
            });
            const payload = await response.json().catch(() => ({}));
            if (!response.ok) {
                statusBox.textContent = payload.message || 'Could not save the new order.';
                return;
            }
            statusBox.textContent = 'Order saved.';
        } catch (err) {
            console.error(err);
            statusBox.textContent = 'Could not save the new order.';
        }
    }
})();
</script>"#;

/// Upload form posting the `file` field to `action`.
pub fn render_upload_form(action: &str, accept: &str, label: &str) -> String {
    format!(
        r#"<form class="wb-upload" method="post" action="{action}" enctype="multipart/form-data">
                        <label for="file">{label}</label>
                        <input id="file" type="file" name="file" accept="{accept}" multiple required>
                        <div><button type="submit">Upload</button></div>
                    </form>"#,
        action = escape_html(action),
        accept = escape_html(accept),
        label = escape_html(label),
    )
}

/// Sortable list of staged files in their current merge order. Files that
/// `active` does not accept are still listed (they keep their slot in the
/// order) but greyed out.
pub fn render_sortable_list(files: &[StagedFile], active: FileKind) -> String {
    if files.is_empty() {
        return r#"<p class="note">No files uploaded yet.</p>"#.to_string();
    }

    let items = files
        .iter()
        .map(|file| {
            let class = if file.kind == Some(active) {
                ""
            } else {
                " class=\"inactive\""
            };
            let tag = file.kind.map(|kind| kind.label()).unwrap_or("Other");
            format!(
                r#"<li draggable="true" data-filename="{name}"{class}><span class="wb-name">{name}</span><span class="wb-tag">{tag}</span><span class="note">{size}</span></li>"#,
                name = escape_html(&file.name),
                size = format_size(file.size),
            )
        })
        .collect::<String>();

    format!(
        r#"<ul id="sortable" class="wb-sortable">{items}</ul>
                    <div id="order-status" class="wb-order-status"></div>"#
    )
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
